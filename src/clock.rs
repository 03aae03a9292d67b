use chrono::{DateTime, Utc};

// Source of "now" for windows and calendar dates
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

#[cfg(test)]
pub use manual::ManualClock;

#[cfg(test)]
mod manual {
    use super::Clock;
    use chrono::{DateTime, TimeDelta, Utc};
    use std::sync::Mutex;

    // only moves when told to
    pub struct ManualClock {
        now: Mutex<DateTime<Utc>>,
    }

    impl ManualClock {
        pub fn new(start: DateTime<Utc>) -> Self {
            Self { now: Mutex::new(start) }
        }

        pub fn at(rfc3339: &str) -> Self {
            let start = DateTime::parse_from_rfc3339(rfc3339)
                .expect("valid rfc3339 timestamp")
                .with_timezone(&Utc);
            Self::new(start)
        }

        pub fn advance(&self, by: std::time::Duration) {
            let mut now = self.now.lock().unwrap();
            *now += TimeDelta::from_std(by).unwrap();
        }

        pub fn set(&self, to: DateTime<Utc>) {
            *self.now.lock().unwrap() = to;
        }
    }

    impl Clock for ManualClock {
        fn now(&self) -> DateTime<Utc> {
            *self.now.lock().unwrap()
        }
    }
}
