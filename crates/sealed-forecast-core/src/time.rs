//! Wall-clock helper shared by every layer that stamps or checks times.

use std::time::{SystemTime, UNIX_EPOCH};

/// Milliseconds since the Unix epoch. A clock set before 1970 reads as 0.
pub fn now_millis() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as i64)
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_now_millis_reads_current_time() {
        let first = now_millis();
        assert!(first > 1_672_531_200_000);
        assert!(now_millis() >= first);
    }
}
