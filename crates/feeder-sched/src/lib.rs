//! feeder-sched: durable scheduling of feed actions.
//!
//! A [`Job`] is either a single future firing (`once`) or a daily recurrence
//! (`daily`), stored as a JSON file that is rewritten in full on every
//! mutation. The [`Scheduler`] owns the job collection exclusively; other
//! components mutate it only through its methods, which persist before
//! returning.

pub mod scheduler;
pub mod store;

use serde::{Deserialize, Serialize};

pub use scheduler::{Scheduler, next_due, next_run};
pub use store::{JobStore, StoreError};

/// Day-of-week in job `days` restrictions, serialized as "Mon".."Sun".
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Weekday {
    Mon,
    Tue,
    Wed,
    Thu,
    Fri,
    Sat,
    Sun,
}

impl From<chrono::Weekday> for Weekday {
    fn from(day: chrono::Weekday) -> Self {
        match day {
            chrono::Weekday::Mon => Self::Mon,
            chrono::Weekday::Tue => Self::Tue,
            chrono::Weekday::Wed => Self::Wed,
            chrono::Weekday::Thu => Self::Thu,
            chrono::Weekday::Fri => Self::Fri,
            chrono::Weekday::Sat => Self::Sat,
            chrono::Weekday::Sun => Self::Sun,
        }
    }
}

/// When a job fires.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum JobKind {
    /// Fires exactly once at an absolute timestamp (RFC3339 or a bare local
    /// datetime), then is removed from storage.
    Once { at: String },
    /// Fires at a local time of day ("HH:MM"), optionally restricted to a
    /// subset of weekdays. Persists until explicitly cancelled.
    Daily {
        time_local: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        days: Option<Vec<Weekday>>,
    },
}

/// A stored scheduling request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Job {
    /// Opaque unique id, stable for the job's lifetime.
    pub id: String,
    #[serde(flatten)]
    pub kind: JobKind,
}

impl Job {
    pub fn once(at: impl Into<String>) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            kind: JobKind::Once { at: at.into() },
        }
    }

    pub fn daily(time_local: impl Into<String>, days: Option<Vec<Weekday>>) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            kind: JobKind::Daily {
                time_local: time_local.into(),
                days,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_job_wire_shape() {
        let job = Job {
            id: "abc".into(),
            kind: JobKind::Once {
                at: "2030-01-01T08:00:00".into(),
            },
        };
        let value = serde_json::to_value(&job).unwrap();
        assert_eq!(value["id"], "abc");
        assert_eq!(value["type"], "once");
        assert_eq!(value["at"], "2030-01-01T08:00:00");

        let job = Job {
            id: "def".into(),
            kind: JobKind::Daily {
                time_local: "08:00".into(),
                days: Some(vec![Weekday::Mon, Weekday::Fri]),
            },
        };
        let value = serde_json::to_value(&job).unwrap();
        assert_eq!(value["type"], "daily");
        assert_eq!(value["time_local"], "08:00");
        assert_eq!(value["days"], serde_json::json!(["Mon", "Fri"]));
    }

    #[test]
    fn test_daily_without_days_omits_field() {
        let job = Job::daily("06:30", None);
        let value = serde_json::to_value(&job).unwrap();
        assert!(value.get("days").is_none());

        let parsed: Job = serde_json::from_value(value).unwrap();
        assert_eq!(parsed, job);
    }
}
