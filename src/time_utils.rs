//! Small date/time helpers.

use chrono::{DateTime, Utc};

/// Split an instant into the day/time completion stamps stored on a record.
pub fn completion_stamps(now: DateTime<Utc>) -> (String, String) {
    (
        now.format("%Y-%m-%d").to_string(),
        now.format("%H:%M:%S").to_string(),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stamps_are_day_and_time() {
        let instant = DateTime::parse_from_rfc3339("2026-08-25T14:30:05Z")
            .unwrap()
            .with_timezone(&Utc);
        let (day, time) = completion_stamps(instant);
        assert_eq!(day, "2026-08-25");
        assert_eq!(time, "14:30:05");
    }
}
