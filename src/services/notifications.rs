use std::sync::Arc;

use crate::models::AppointmentDetail;
use crate::state::AppState;

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ReminderKind {
    DayBefore,
    TwoHours,
}

impl ReminderKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ReminderKind::DayBefore => "24h",
            ReminderKind::TwoHours => "2h",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "24h" => Some(ReminderKind::DayBefore),
            "2h" => Some(ReminderKind::TwoHours),
            _ => None,
        }
    }
}

pub fn confirmation(appointment: &AppointmentDetail) -> (String, String) {
    let subject = format!("Appointment confirmed - {}", appointment.appointment_date);
    let body = format!(
        "Hello {},\n\n\
         Your appointment has been confirmed.\n\n\
         Date: {}\n\
         Time: {}\n\
         Treatment: {} ({} min)\n\
         Price: ${:.2}\n\n\
         If you cannot attend, please cancel at least 2 hours in advance.\n",
        appointment.patient_name,
        appointment.appointment_date,
        appointment.appointment_time.format("%H:%M"),
        appointment.specialty_name,
        appointment.duration_minutes,
        appointment.price,
    );
    (subject, body)
}

pub fn cancellation(
    appointment: &AppointmentDetail,
    reason: Option<&str>,
    staff_initiated: bool,
) -> (String, String) {
    let subject = if staff_initiated {
        format!(
            "Appointment cancelled by the clinic - {}",
            appointment.appointment_date
        )
    } else {
        format!("Appointment cancelled - {}", appointment.appointment_date)
    };

    let origin = if staff_initiated {
        "Your appointment was cancelled by the clinic."
    } else {
        "Your appointment was cancelled by you."
    };

    let mut body = format!(
        "Hello {},\n\n\
         {}\n\n\
         Date: {}\n\
         Time: {}\n\
         Treatment: {}\n",
        appointment.patient_name,
        origin,
        appointment.appointment_date,
        appointment.appointment_time.format("%H:%M"),
        appointment.specialty_name,
    );
    if let Some(reason) = reason {
        body.push_str(&format!("Reason: {reason}\n"));
    }
    body.push_str("\nYou can book a new appointment at any time.\n");

    (subject, body)
}

pub fn reminder(appointment: &AppointmentDetail, kind: ReminderKind) -> (String, String) {
    let subject = match kind {
        ReminderKind::DayBefore => {
            format!("Reminder: appointment tomorrow - {}", appointment.appointment_date)
        }
        ReminderKind::TwoHours => format!(
            "Reminder: appointment today at {}",
            appointment.appointment_time.format("%H:%M")
        ),
    };
    let body = format!(
        "Hello {},\n\n\
         This is a reminder of your upcoming appointment.\n\n\
         Date: {}\n\
         Time: {}\n\
         Treatment: {}\n\n\
         If you cannot attend, please cancel at least 2 hours in advance.\n",
        appointment.patient_name,
        appointment.appointment_date,
        appointment.appointment_time.format("%H:%M"),
        appointment.specialty_name,
    );
    (subject, body)
}

/// Fire-and-forget send. A failed email must never fail the operation that
/// triggered it; it is logged and dropped.
pub fn send_in_background(state: &Arc<AppState>, to: String, subject: String, body: String) {
    let state = Arc::clone(state);
    tokio::spawn(async move {
        if let Err(e) = state.mailer.send(&to, &subject, &body).await {
            tracing::warn!("failed to send email to {to}: {e:#}");
        }
    });
}

/// Best-effort bulk send, one email per affected patient. A failure is logged
/// and the remaining sends continue.
pub fn send_bulk_in_background(state: &Arc<AppState>, emails: Vec<(String, String, String)>) {
    let state = Arc::clone(state);
    tokio::spawn(async move {
        for (to, subject, body) in emails {
            if let Err(e) = state.mailer.send(&to, &subject, &body).await {
                tracing::warn!("failed to send email to {to}: {e:#}");
            }
        }
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{NaiveDate, NaiveTime, Utc};

    use crate::models::AppointmentStatus;

    fn detail() -> AppointmentDetail {
        AppointmentDetail {
            id: 1,
            user_id: 1,
            appointment_date: NaiveDate::from_ymd_opt(2024, 6, 3).unwrap(),
            appointment_time: NaiveTime::from_hms_opt(9, 0, 0).unwrap(),
            status: AppointmentStatus::Confirmed,
            notes: None,
            cancelled_by_admin: false,
            patient_name: "Ana Suarez".to_string(),
            patient_email: "ana@example.com".to_string(),
            specialty_name: "Dental cleaning".to_string(),
            duration_minutes: 30,
            price: 8000.0,
            created_at: Utc::now().naive_utc(),
        }
    }

    #[test]
    fn test_confirmation_mentions_slot() {
        let (subject, body) = confirmation(&detail());
        assert!(subject.contains("2024-06-03"));
        assert!(body.contains("09:00"));
        assert!(body.contains("Dental cleaning"));
    }

    #[test]
    fn test_cancellation_wording_differs_by_origin() {
        let (staff_subject, staff_body) = cancellation(&detail(), Some("flooding"), true);
        assert!(staff_subject.contains("by the clinic"));
        assert!(staff_body.contains("cancelled by the clinic"));
        assert!(staff_body.contains("Reason: flooding"));

        let (patient_subject, patient_body) = cancellation(&detail(), None, false);
        assert!(!patient_subject.contains("by the clinic"));
        assert!(patient_body.contains("cancelled by you"));
        assert!(!patient_body.contains("Reason:"));
    }

    #[test]
    fn test_reminder_kinds() {
        let (day_subject, _) = reminder(&detail(), ReminderKind::DayBefore);
        assert!(day_subject.contains("tomorrow"));

        let (urgent_subject, _) = reminder(&detail(), ReminderKind::TwoHours);
        assert!(urgent_subject.contains("today at 09:00"));
    }

    #[test]
    fn test_kind_round_trip() {
        assert_eq!(ReminderKind::parse("24h"), Some(ReminderKind::DayBefore));
        assert_eq!(ReminderKind::parse("2h"), Some(ReminderKind::TwoHours));
        assert_eq!(ReminderKind::parse("1h"), None);
        assert_eq!(ReminderKind::DayBefore.as_str(), "24h");
    }
}
