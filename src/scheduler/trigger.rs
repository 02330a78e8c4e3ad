use chrono::{DateTime, Datelike, Duration, TimeZone, Utc, Weekday};
use chrono_tz::Tz;
use rand::Rng;
use serde::{Deserialize, Serialize};

/// When a scheduled job fires.
///
/// Serialized into the job row, so a restart resumes every trigger from
/// the store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Trigger {
    /// Fire once at an absolute instant
    Once { at: DateTime<Utc> },
    /// Fire every `every_secs` inside [start, end), with up to
    /// `jitter_secs` of random delay added to each fire
    Interval {
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        every_secs: i64,
        jitter_secs: i64,
    },
    /// Fire weekly at a civil wall-clock time in a named timezone
    Weekly {
        weekday: Weekday,
        hour: u32,
        minute: u32,
        tz: String,
    },
}

impl Trigger {
    /// Next instant this trigger fires strictly after `now`, or None
    /// when the trigger is exhausted (one-shot fired, window elapsed).
    pub fn next_fire_after<R: Rng>(&self, now: DateTime<Utc>, rng: &mut R) -> Option<DateTime<Utc>> {
        match self {
            Trigger::Once { at } => (*at > now).then_some(*at),
            Trigger::Interval {
                start,
                end,
                every_secs,
                jitter_secs,
            } => {
                let every = (*every_secs).max(1);
                let candidate = if now < *start {
                    *start
                } else {
                    let periods = (now - *start).num_seconds() / every + 1;
                    *start + Duration::seconds(every * periods)
                };
                if candidate >= *end {
                    return None;
                }
                // Jitter desynchronizes polls against the source; it may
                // spill a fire slightly past the window edge.
                if *jitter_secs > 0 {
                    Some(candidate + Duration::seconds(rng.gen_range(0..=*jitter_secs)))
                } else {
                    Some(candidate)
                }
            }
            Trigger::Weekly {
                weekday,
                hour,
                minute,
                tz,
            } => {
                let tz: Tz = tz.parse().ok()?;
                let local_now = now.with_timezone(&tz);
                for day_offset in 0..=7 {
                    let date = local_now.date_naive() + Duration::days(day_offset);
                    if date.weekday() != *weekday {
                        continue;
                    }
                    let naive = date.and_hms_opt(*hour, *minute, 0)?;
                    // A nonexistent local time (DST gap) skips to the
                    // next occurrence.
                    let Some(local) = tz.from_local_datetime(&naive).earliest() else {
                        continue;
                    };
                    let candidate = local.with_timezone(&Utc);
                    if candidate > now {
                        return Some(candidate);
                    }
                }
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn rng() -> StdRng {
        StdRng::seed_from_u64(42)
    }

    fn utc(y: i32, mo: u32, d: u32, h: u32, mi: u32, s: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, mo, d, h, mi, s).unwrap()
    }

    #[test]
    fn test_once_fires_only_in_the_future() {
        let at = utc(2025, 9, 21, 17, 0, 0);
        let trigger = Trigger::Once { at };

        assert_eq!(
            trigger.next_fire_after(utc(2025, 9, 21, 16, 0, 0), &mut rng()),
            Some(at)
        );
        assert_eq!(trigger.next_fire_after(at, &mut rng()), None);
    }

    #[test]
    fn test_interval_first_fire_is_window_start() {
        let start = utc(2025, 9, 21, 17, 0, 0);
        let trigger = Trigger::Interval {
            start,
            end: start + Duration::hours(8),
            every_secs: 300,
            jitter_secs: 0,
        };

        let fire = trigger
            .next_fire_after(start - Duration::minutes(30), &mut rng())
            .unwrap();
        assert_eq!(fire, start);
    }

    #[test]
    fn test_interval_steps_stay_aligned_to_start() {
        let start = utc(2025, 9, 21, 17, 0, 0);
        let trigger = Trigger::Interval {
            start,
            end: start + Duration::hours(8),
            every_secs: 300,
            jitter_secs: 0,
        };

        // 17:07 falls between the 17:05 and 17:10 marks.
        let fire = trigger
            .next_fire_after(utc(2025, 9, 21, 17, 7, 0), &mut rng())
            .unwrap();
        assert_eq!(fire, utc(2025, 9, 21, 17, 10, 0));
    }

    #[test]
    fn test_interval_exhausts_at_window_end() {
        let start = utc(2025, 9, 21, 17, 0, 0);
        let end = start + Duration::hours(8);
        let trigger = Trigger::Interval {
            start,
            end,
            every_secs: 300,
            jitter_secs: 0,
        };

        assert_eq!(trigger.next_fire_after(end, &mut rng()), None);
        assert_eq!(
            trigger.next_fire_after(end - Duration::seconds(1), &mut rng()),
            None
        );
    }

    #[test]
    fn test_interval_jitter_is_bounded() {
        let start = utc(2025, 9, 21, 17, 0, 0);
        let trigger = Trigger::Interval {
            start,
            end: start + Duration::hours(8),
            every_secs: 300,
            jitter_secs: 60,
        };

        let mut rng = rng();
        for _ in 0..100 {
            let fire = trigger
                .next_fire_after(utc(2025, 9, 21, 17, 1, 0), &mut rng)
                .unwrap();
            assert!(fire >= utc(2025, 9, 21, 17, 5, 0));
            assert!(fire <= utc(2025, 9, 21, 17, 6, 0));
        }
    }

    #[test]
    fn test_weekly_resolves_civil_time_to_utc() {
        // January: Pacific standard time, UTC-8.
        let trigger = Trigger::Weekly {
            weekday: Weekday::Wed,
            hour: 6,
            minute: 0,
            tz: "America/Los_Angeles".to_string(),
        };

        let fire = trigger
            .next_fire_after(utc(2025, 1, 6, 12, 0, 0), &mut rng())
            .unwrap();
        assert_eq!(fire, utc(2025, 1, 8, 14, 0, 0));

        // July: daylight time, UTC-7.
        let fire = trigger
            .next_fire_after(utc(2025, 7, 7, 12, 0, 0), &mut rng())
            .unwrap();
        assert_eq!(fire, utc(2025, 7, 9, 13, 0, 0));
    }

    #[test]
    fn test_weekly_same_day_rolls_to_next_week_once_past() {
        let trigger = Trigger::Weekly {
            weekday: Weekday::Wed,
            hour: 6,
            minute: 0,
            tz: "America/Los_Angeles".to_string(),
        };

        // Wednesday Jan 8, 15:00 UTC is past 06:00 Pacific (14:00 UTC).
        let fire = trigger
            .next_fire_after(utc(2025, 1, 8, 15, 0, 0), &mut rng())
            .unwrap();
        assert_eq!(fire, utc(2025, 1, 15, 14, 0, 0));
    }

    #[test]
    fn test_trigger_round_trips_through_json() {
        let trigger = Trigger::Interval {
            start: utc(2025, 9, 21, 17, 0, 0),
            end: utc(2025, 9, 22, 1, 0, 0),
            every_secs: 300,
            jitter_secs: 60,
        };
        let value = serde_json::to_value(&trigger).unwrap();
        let back: Trigger = serde_json::from_value(value).unwrap();
        assert_eq!(back, trigger);
    }
}
