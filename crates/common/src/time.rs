use std::time::{SystemTime, UNIX_EPOCH};

/// Current wall-clock time as unix seconds.
#[must_use]
pub fn unix_now() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs() as i64
}

/// Current wall-clock time as unix milliseconds.
#[must_use]
pub fn unix_now_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u64
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn seconds_and_millis_agree() {
        let secs = unix_now();
        let ms = unix_now_ms();
        assert!(secs > 1_600_000_000);
        assert!((ms / 1000) as i64 >= secs);
    }
}
