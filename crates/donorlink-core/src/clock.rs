//! Server-side timestamp source for record stores.

use chrono::{DateTime, Duration, Timelike, Utc};
use std::sync::Mutex;

/// Hands out strictly increasing UTC timestamps.
///
/// Stores resolve `FieldValue::ServerTimestamp` through one of these, so two
/// writes landing in the same clock tick still order correctly.
#[derive(Debug, Default)]
pub struct ServerClock {
    last: Mutex<Option<DateTime<Utc>>>,
}

impl ServerClock {
    pub fn new() -> Self {
        Self::default()
    }

    /// Next timestamp, always later than the previous one.
    pub fn now(&self) -> DateTime<Utc> {
        let mut last = match self.last.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        // Stored timestamps carry microseconds; compare at that precision.
        let wall = Utc::now();
        let mut now = wall
            .with_nanosecond(wall.nanosecond() / 1_000 * 1_000)
            .unwrap_or(wall);
        if let Some(prev) = *last {
            if now <= prev {
                now = prev + Duration::microseconds(1);
            }
        }
        *last = Some(now);
        now
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_strictly_increasing() {
        let clock = ServerClock::new();
        let mut prev = clock.now();
        for _ in 0..1000 {
            let next = clock.now();
            assert!(next > prev);
            prev = next;
        }
    }
}
