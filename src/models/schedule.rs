use chrono::NaiveTime;
use serde::Deserialize;

/// One opening period of a working day. `last_slot` is the latest bookable
/// start time, which may sit before the nominal closing time so the visit
/// finishes before the clinic closes.
#[derive(Debug, Clone, PartialEq)]
pub struct Period {
    pub opens: NaiveTime,
    pub last_slot: NaiveTime,
}

/// Weekly opening hours, keyed by weekday index (0=Sunday..6=Saturday).
/// Loaded at startup; handlers never consult a hardcoded table.
#[derive(Debug, Clone)]
pub struct ScheduleTemplate {
    periods: [Vec<Period>; 7],
}

#[derive(Deserialize)]
struct RawEntry {
    weekday: u8,
    opens: String,
    last_slot: String,
}

#[derive(Deserialize)]
struct RawTemplate {
    days: Vec<RawEntry>,
}

impl ScheduleTemplate {
    /// The clinic's regular hours: mornings Monday/Wednesday/Friday
    /// (09:00, last slot 12:00), evenings Tuesday/Thursday (15:00, last
    /// slot 20:30), closed on weekends.
    pub fn clinic_default() -> Self {
        let morning = Period {
            opens: time(9, 0),
            last_slot: time(12, 0),
        };
        let evening = Period {
            opens: time(15, 0),
            last_slot: time(20, 30),
        };
        Self {
            periods: [
                vec![],
                vec![morning.clone()],
                vec![evening.clone()],
                vec![morning.clone()],
                vec![evening],
                vec![morning],
                vec![],
            ],
        }
    }

    pub fn from_json(s: &str) -> anyhow::Result<Self> {
        let raw: RawTemplate = serde_json::from_str(s)?;
        let mut periods: [Vec<Period>; 7] = Default::default();

        for entry in raw.days {
            if entry.weekday > 6 {
                anyhow::bail!("invalid weekday index: {}", entry.weekday);
            }
            let opens = parse_time(&entry.opens)?;
            let last_slot = parse_time(&entry.last_slot)?;
            if last_slot < opens {
                anyhow::bail!(
                    "last slot {} precedes opening time {}",
                    entry.last_slot,
                    entry.opens
                );
            }
            periods[entry.weekday as usize].push(Period { opens, last_slot });
        }

        Ok(Self { periods })
    }

    pub fn periods_for(&self, weekday: usize) -> &[Period] {
        &self.periods[weekday]
    }
}

fn time(hour: u32, minute: u32) -> NaiveTime {
    NaiveTime::from_hms_opt(hour, minute, 0).expect("valid time literal")
}

fn parse_time(s: &str) -> anyhow::Result<NaiveTime> {
    NaiveTime::parse_from_str(s, "%H:%M")
        .map_err(|_| anyhow::anyhow!("invalid time format: {s}"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_has_weekends_closed() {
        let template = ScheduleTemplate::clinic_default();
        assert!(template.periods_for(0).is_empty());
        assert!(template.periods_for(6).is_empty());
    }

    #[test]
    fn test_default_monday_morning() {
        let template = ScheduleTemplate::clinic_default();
        let periods = template.periods_for(1);
        assert_eq!(periods.len(), 1);
        assert_eq!(periods[0].opens, time(9, 0));
        assert_eq!(periods[0].last_slot, time(12, 0));
    }

    #[test]
    fn test_parse_valid_json() {
        let json = r#"{"days":[{"weekday":1,"opens":"08:00","last_slot":"11:30"}]}"#;
        let template = ScheduleTemplate::from_json(json).unwrap();
        assert_eq!(template.periods_for(1).len(), 1);
        assert!(template.periods_for(2).is_empty());
    }

    #[test]
    fn test_parse_invalid_weekday() {
        let json = r#"{"days":[{"weekday":7,"opens":"08:00","last_slot":"11:30"}]}"#;
        assert!(ScheduleTemplate::from_json(json).is_err());
    }

    #[test]
    fn test_parse_invalid_time() {
        let json = r#"{"days":[{"weekday":1,"opens":"25:00","last_slot":"11:30"}]}"#;
        assert!(ScheduleTemplate::from_json(json).is_err());
    }

    #[test]
    fn test_parse_last_slot_before_opening() {
        let json = r#"{"days":[{"weekday":1,"opens":"12:00","last_slot":"09:00"}]}"#;
        assert!(ScheduleTemplate::from_json(json).is_err());
    }

    #[test]
    fn test_parse_not_json() {
        assert!(ScheduleTemplate::from_json("not json").is_err());
    }
}
