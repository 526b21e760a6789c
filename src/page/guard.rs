//! Windowed claim primitive shared by the duplicate-click guard and the
//! archived-transform debounce.
//!
//! A claim on a key succeeds once per window; repeat claims inside the window
//! are rejected. With the click window this doubles as per-element mutual
//! exclusion: the same click can reach us twice through overlapping listener
//! paths during DOM churn, and a second click cannot start a resolution while
//! the first one's window is open.

use std::collections::hash_map::Entry;
use std::collections::HashMap;
use std::sync::Mutex;
use std::time::{Duration, Instant};

/// Default suppression window for duplicate click delivery.
pub const CLICK_GUARD_MS: u64 = 600;

pub struct RecencyGuard {
    window: Duration,
    seen: Mutex<HashMap<u64, Instant>>,
}

impl RecencyGuard {
    pub fn new(window: Duration) -> Self {
        Self {
            window,
            seen: Mutex::new(HashMap::new()),
        }
    }

    pub fn with_default_window() -> Self {
        Self::new(Duration::from_millis(CLICK_GUARD_MS))
    }

    /// Claim `key`. Returns false while a previous claim is still fresh.
    /// Expired entries are pruned on the way through.
    pub fn try_claim(&self, key: u64) -> bool {
        let now = Instant::now();
        let mut seen = self.seen.lock().unwrap();
        seen.retain(|_, at| now.duration_since(*at) < self.window);
        match seen.entry(key) {
            Entry::Occupied(_) => false,
            Entry::Vacant(slot) => {
                slot.insert(now);
                true
            }
        }
    }

    /// Drop a claim before its window expires.
    pub fn release(&self, key: u64) {
        self.seen.lock().unwrap().remove(&key);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn second_claim_in_window_is_rejected() {
        let guard = RecencyGuard::new(Duration::from_millis(200));
        assert!(guard.try_claim(7));
        assert!(!guard.try_claim(7));
        // other keys are independent
        assert!(guard.try_claim(8));
    }

    #[test]
    fn claim_succeeds_again_after_expiry() {
        let guard = RecencyGuard::new(Duration::from_millis(10));
        assert!(guard.try_claim(7));
        std::thread::sleep(Duration::from_millis(25));
        assert!(guard.try_claim(7));
    }

    #[test]
    fn release_clears_early() {
        let guard = RecencyGuard::new(Duration::from_secs(60));
        assert!(guard.try_claim(7));
        guard.release(7);
        assert!(guard.try_claim(7));
    }
}
