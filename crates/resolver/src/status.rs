use std::sync::atomic::{AtomicI64, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};

/// Starting weight for a resolver that has never failed.
pub const BASE_WEIGHT: u32 = 60;

/// A resolver never drops below this weight, however recently it failed.
const MIN_WEIGHT: u32 = 1;

fn now_unix() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs() as i64)
        .unwrap_or(0)
}

/// Tracks one upstream's recent error history for weighted selection.
///
/// `last_error_at` is `0` (meaning "never"). Reads and writes are plain
/// atomic loads/stores --- there's no multi-step invariant to protect,
/// so no compare-and-swap is needed here (unlike [`crate::ipset::IPSet`]'s
/// rotation counter).
#[derive(Debug, Default)]
pub struct ResolverStatus {
    last_error_at: AtomicI64,
}

impl ResolverStatus {
    pub fn new() -> Self {
        Self {
            last_error_at: AtomicI64::new(0),
        }
    }

    pub fn record_error(&self) {
        self.last_error_at.store(now_unix(), Ordering::Relaxed);
    }

    pub fn record_success(&self) {
        // A success doesn't erase history; weight recovers naturally as
        // the last error ages past an hour.
    }

    /// Current selection weight: starts at [`BASE_WEIGHT`] and is reduced
    /// by one point per minute since the last recorded error, floored at
    /// [`MIN_WEIGHT`] and fully recovered after an hour with no errors.
    pub fn weight(&self) -> u32 {
        let last_error_at = self.last_error_at.load(Ordering::Relaxed);
        if last_error_at == 0 {
            return BASE_WEIGHT;
        }
        let elapsed_minutes = ((now_unix() - last_error_at).max(0) / 60) as u32;
        if elapsed_minutes >= BASE_WEIGHT {
            return BASE_WEIGHT;
        }
        (BASE_WEIGHT - (BASE_WEIGHT - elapsed_minutes)).max(MIN_WEIGHT)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn never_errored_has_base_weight() {
        let status = ResolverStatus::new();
        assert_eq!(status.weight(), BASE_WEIGHT);
    }

    #[test]
    fn fresh_error_drops_weight_to_floor() {
        let status = ResolverStatus::new();
        status.record_error();
        assert_eq!(status.weight(), MIN_WEIGHT);
    }

    #[test]
    fn weight_never_goes_below_floor() {
        let status = ResolverStatus::new();
        status.last_error_at.store(now_unix(), Ordering::Relaxed);
        assert!(status.weight() >= MIN_WEIGHT);
    }

    #[test]
    fn old_error_recovers_to_base_weight() {
        let status = ResolverStatus::new();
        status
            .last_error_at
            .store(now_unix() - 3601, Ordering::Relaxed);
        assert_eq!(status.weight(), BASE_WEIGHT);
    }
}
