use std::sync::{Arc, Mutex};

use rusqlite::Connection;

use crate::config::AppConfig;
use crate::models::ScheduleTemplate;
use crate::services::mailer::Mailer;

pub struct AppState {
    pub db: Arc<Mutex<Connection>>,
    pub config: AppConfig,
    pub schedule: ScheduleTemplate,
    pub mailer: Box<dyn Mailer>,
}
