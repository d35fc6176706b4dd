use std::sync::{Arc, Mutex};

use anyhow::Context;
use axum::routing::{delete, get, post, put};
use axum::Router;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing_subscriber::EnvFilter;

use turnero::config::AppConfig;
use turnero::db;
use turnero::handlers;
use turnero::models::ScheduleTemplate;
use turnero::services::mailer::mailgun::MailgunMailer;
use turnero::services::mailer::{LogMailer, Mailer};
use turnero::services::reminders;
use turnero::state::AppState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let _ = dotenvy::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    let config = AppConfig::from_env();

    let conn = db::init_db(&config.database_url)?;

    let schedule = match &config.schedule_file {
        Some(path) => {
            let raw = std::fs::read_to_string(path)
                .with_context(|| format!("failed to read schedule file: {path}"))?;
            let schedule = ScheduleTemplate::from_json(&raw)
                .with_context(|| format!("invalid schedule file: {path}"))?;
            tracing::info!("loaded schedule template from {path}");
            schedule
        }
        None => ScheduleTemplate::clinic_default(),
    };

    let mailer: Box<dyn Mailer> = if config.mailgun_api_key.is_empty() {
        tracing::warn!("MAILGUN_API_KEY not set, emails will be logged instead of sent");
        Box::new(LogMailer)
    } else {
        tracing::info!("using Mailgun mail provider (domain: {})", config.mailgun_domain);
        Box::new(MailgunMailer::new(
            config.mailgun_domain.clone(),
            config.mailgun_api_key.clone(),
            config.mail_from.clone(),
        ))
    };

    let state = Arc::new(AppState {
        db: Arc::new(Mutex::new(conn)),
        config: config.clone(),
        schedule,
        mailer,
    });

    reminders::spawn(Arc::clone(&state));

    let app = Router::new()
        .route("/health", get(handlers::health::health))
        .route("/api/specialties", get(handlers::specialties::list_specialties))
        .route(
            "/api/appointments/available-slots",
            get(handlers::appointments::available_slots),
        )
        .route(
            "/api/appointments",
            post(handlers::appointments::create_appointment)
                .get(handlers::appointments::list_my_appointments),
        )
        .route(
            "/api/appointments/:id",
            get(handlers::appointments::get_appointment),
        )
        .route(
            "/api/appointments/:id/cancel",
            put(handlers::appointments::cancel_appointment),
        )
        .route(
            "/api/non-working-days",
            get(handlers::appointments::non_working_days),
        )
        .route(
            "/api/admin/appointments",
            get(handlers::admin::list_appointments),
        )
        .route(
            "/api/admin/appointments/:id",
            delete(handlers::admin::delete_appointment),
        )
        .route(
            "/api/admin/appointments/:id/status",
            put(handlers::admin::update_status),
        )
        .route(
            "/api/admin/appointments/:id/reminder",
            post(handlers::admin::send_reminder),
        )
        .route(
            "/api/admin/non-working-days",
            get(handlers::admin::list_blocks).post(handlers::admin::block_day),
        )
        .route(
            "/api/admin/non-working-days/range",
            post(handlers::admin::block_range),
        )
        .route(
            "/api/admin/non-working-days/:id",
            delete(handlers::admin::unblock),
        )
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state);

    let addr = format!("0.0.0.0:{}", config.port);
    tracing::info!("starting server on {addr}");

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
