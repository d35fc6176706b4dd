use chrono::{Datelike, Duration, NaiveDate, NaiveTime};

use crate::models::ScheduleTemplate;

/// Slot spacing is fixed clinic-wide; specialty duration only affects what
/// the patient is told, not the grid.
pub const SLOT_INTERVAL_MINUTES: i64 = 30;

/// Nominal slots for a date, before removing booked or blocked ones. Pure:
/// weekday lookup into the template, then a fixed-step walk per period up to
/// and including the period's last bookable slot.
pub fn generate_slots(template: &ScheduleTemplate, date: NaiveDate) -> Vec<NaiveTime> {
    let weekday = date.weekday().num_days_from_sunday() as usize;

    let mut slots = Vec::new();
    for period in template.periods_for(weekday) {
        let mut current = period.opens;
        while current <= period.last_slot {
            slots.push(current);
            let (next, wrapped) =
                current.overflowing_add_signed(Duration::minutes(SLOT_INTERVAL_MINUTES));
            if wrapped != 0 {
                break;
            }
            current = next;
        }
    }
    slots
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(s: &str) -> NaiveDate {
        s.parse().unwrap()
    }

    fn render(slots: &[NaiveTime]) -> Vec<String> {
        slots.iter().map(|t| t.format("%H:%M").to_string()).collect()
    }

    #[test]
    fn test_weekend_has_no_slots() {
        let template = ScheduleTemplate::clinic_default();
        // 2024-06-01 is a Saturday, 2024-06-02 a Sunday
        assert!(generate_slots(&template, date("2024-06-01")).is_empty());
        assert!(generate_slots(&template, date("2024-06-02")).is_empty());
    }

    #[test]
    fn test_monday_morning_slots() {
        let template = ScheduleTemplate::clinic_default();
        // 2024-06-03 is a Monday: 09:00 through 12:00 inclusive
        let slots = render(&generate_slots(&template, date("2024-06-03")));
        assert_eq!(
            slots,
            vec!["09:00", "09:30", "10:00", "10:30", "11:00", "11:30", "12:00"]
        );
    }

    #[test]
    fn test_tuesday_evening_slots() {
        let template = ScheduleTemplate::clinic_default();
        // 2024-06-04 is a Tuesday: 15:00 through 20:30 inclusive, 12 slots
        let slots = generate_slots(&template, date("2024-06-04"));
        assert_eq!(slots.len(), 12);
        assert_eq!(slots.first().unwrap().format("%H:%M").to_string(), "15:00");
        assert_eq!(slots.last().unwrap().format("%H:%M").to_string(), "20:30");
    }

    #[test]
    fn test_cutoff_is_inclusive() {
        let template = ScheduleTemplate::from_json(
            r#"{"days":[{"weekday":1,"opens":"09:00","last_slot":"10:00"}]}"#,
        )
        .unwrap();
        let slots = render(&generate_slots(&template, date("2024-06-03")));
        assert_eq!(slots, vec!["09:00", "09:30", "10:00"]);
    }

    #[test]
    fn test_cutoff_not_on_grid() {
        // A slot past the cutoff is never emitted, even when the cutoff does
        // not fall on the 30-minute grid.
        let template = ScheduleTemplate::from_json(
            r#"{"days":[{"weekday":1,"opens":"09:00","last_slot":"10:15"}]}"#,
        )
        .unwrap();
        let slots = render(&generate_slots(&template, date("2024-06-03")));
        assert_eq!(slots, vec!["09:00", "09:30", "10:00"]);
    }

    #[test]
    fn test_deterministic() {
        let template = ScheduleTemplate::clinic_default();
        let a = generate_slots(&template, date("2024-06-03"));
        let b = generate_slots(&template, date("2024-06-03"));
        assert_eq!(a, b);
    }
}
