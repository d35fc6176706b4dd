use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use chrono::Local;

use crate::db::queries;
use crate::errors::AppError;
use crate::services::notifications::{self, ReminderKind};
use crate::state::AppState;

const DAY_BEFORE_PASS_SECS: u64 = 3600;
const SAME_DAY_PASS_SECS: u64 = 900;
const SEND_PAUSE_SECS: u64 = 1;

/// 2-hour reminders go out when the appointment is this many minutes away.
const SAME_DAY_WINDOW_MIN: i64 = 90;
const SAME_DAY_WINDOW_MAX: i64 = 120;

/// Start the two reminder loops: an hourly 24-hour pass and a 2-hour pass
/// every 15 minutes, each on its own timer like the cron jobs they replace.
pub fn spawn(state: Arc<AppState>) {
    let scheduler = Arc::new(ReminderScheduler {
        state,
        busy: AtomicBool::new(false),
    });

    let day_before = Arc::clone(&scheduler);
    tokio::spawn(async move {
        let mut hourly = tokio::time::interval(Duration::from_secs(DAY_BEFORE_PASS_SECS));
        loop {
            hourly.tick().await;
            day_before.day_before_tick().await;
        }
    });

    tokio::spawn(async move {
        let mut quarter_hourly =
            tokio::time::interval(Duration::from_secs(SAME_DAY_PASS_SECS));
        loop {
            quarter_hourly.tick().await;
            scheduler.same_day_tick().await;
        }
    });

    tracing::info!(
        "reminder scheduler started (24h pass hourly, 2h pass every 15 minutes)"
    );
}

struct ReminderScheduler {
    state: Arc<AppState>,
    busy: AtomicBool,
}

impl ReminderScheduler {
    /// Hourly 24-hour pass. A tick that fires while the previous pass is
    /// still sending is skipped, not queued.
    async fn day_before_tick(&self) {
        if self.busy.swap(true, Ordering::SeqCst) {
            tracing::debug!("24h reminder pass still running, skipping tick");
            return;
        }
        if let Err(e) = self.day_before_pass().await {
            tracing::error!("24h reminder pass failed: {e:#}");
        }
        self.busy.store(false, Ordering::SeqCst);
    }

    async fn day_before_pass(&self) -> anyhow::Result<()> {
        let tomorrow = Local::now()
            .date_naive()
            .succ_opt()
            .context("date overflow")?;

        let due = {
            let db = self.state.db.lock().unwrap();
            queries::unsent_24h_reminders(&db, tomorrow)?
        };
        if due.is_empty() {
            return Ok(());
        }
        tracing::info!("sending {} 24h reminders for {tomorrow}", due.len());

        for appointment in due {
            let (subject, body) = notifications::reminder(&appointment, ReminderKind::DayBefore);
            match self
                .state
                .mailer
                .send(&appointment.patient_email, &subject, &body)
                .await
            {
                Ok(()) => {
                    let db = self.state.db.lock().unwrap();
                    queries::mark_24h_reminder_sent(&db, appointment.id)?;
                }
                Err(e) => {
                    tracing::warn!(
                        "failed to send 24h reminder to {}: {e:#}",
                        appointment.patient_email
                    );
                }
            }
            tokio::time::sleep(Duration::from_secs(SEND_PAUSE_SECS)).await;
        }
        Ok(())
    }

    async fn same_day_tick(&self) {
        if let Err(e) = self.same_day_pass().await {
            tracing::error!("2h reminder pass failed: {e:#}");
        }
    }

    async fn same_day_pass(&self) -> anyhow::Result<()> {
        let now = Local::now().naive_local();

        let candidates = {
            let db = self.state.db.lock().unwrap();
            queries::unsent_2h_candidates(&db, now.date())?
        };

        for appointment in candidates {
            let minutes_until = (appointment.starts_at() - now).num_minutes();
            if minutes_until <= SAME_DAY_WINDOW_MIN || minutes_until > SAME_DAY_WINDOW_MAX {
                continue;
            }

            let (subject, body) = notifications::reminder(&appointment, ReminderKind::TwoHours);
            match self
                .state
                .mailer
                .send(&appointment.patient_email, &subject, &body)
                .await
            {
                Ok(()) => {
                    let db = self.state.db.lock().unwrap();
                    queries::mark_2h_reminder_sent(&db, appointment.id)?;
                }
                Err(e) => {
                    tracing::warn!(
                        "failed to send 2h reminder to {}: {e:#}",
                        appointment.patient_email
                    );
                }
            }
            tokio::time::sleep(Duration::from_secs(SEND_PAUSE_SECS)).await;
        }
        Ok(())
    }
}

/// Staff-triggered resend for one appointment. Unlike the scheduled passes,
/// the send result is the outcome of this operation, so failures surface.
pub async fn send_manual_reminder(
    state: &AppState,
    appointment_id: i64,
    kind: ReminderKind,
) -> Result<(), AppError> {
    let appointment = {
        let db = state.db.lock().unwrap();
        queries::get_appointment_detail(&db, appointment_id)?
    }
    .ok_or(AppError::NotFound("appointment"))?;

    let (subject, body) = notifications::reminder(&appointment, kind);
    state
        .mailer
        .send(&appointment.patient_email, &subject, &body)
        .await
        .map_err(AppError::Internal)?;
    Ok(())
}
