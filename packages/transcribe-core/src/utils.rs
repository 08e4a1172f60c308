//! General utilities shared across the application.

use std::time::{SystemTime, UNIX_EPOCH};

/// Returns the current Unix timestamp in milliseconds.
///
/// Returns 0 if the system clock is before the Unix epoch (shouldn't happen in practice).
#[must_use]
pub fn now_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}

/// Generates a connect-id unique enough for `X-Api-Connect-Id`.
///
/// Format: `{ms_since_epoch}-{5-digit zero-padded counter derived from the
/// sub-millisecond component}`, mirroring the reference implementation's `_uuid()`.
/// The sub-millisecond component can in principle roll over (it's computed from a
/// truncated nanosecond remainder); any unique-per-session string is sufficient here,
/// so the roll-over is not treated as a bug.
#[must_use]
pub fn generate_connect_id() -> String {
    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_nanos())
        .unwrap_or(0);
    let ms = nanos / 1_000_000;
    let sub_ms = ((nanos % 1_000_000) / 10) % 100_000;
    format!("{ms}-{sub_ms:05}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn connect_id_has_expected_shape() {
        let id = generate_connect_id();
        let (ms_part, counter_part) = id.split_once('-').expect("id has a dash separator");
        assert!(ms_part.parse::<u128>().is_ok());
        assert_eq!(counter_part.len(), 5);
        assert!(counter_part.chars().all(|c| c.is_ascii_digit()));
    }

    #[test]
    fn connect_ids_are_distinct_across_calls() {
        let a = generate_connect_id();
        std::thread::sleep(std::time::Duration::from_millis(2));
        let b = generate_connect_id();
        assert_ne!(a, b);
    }
}
