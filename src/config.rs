//! Configuration for the async execution bridge.

use serde::{Deserialize, Serialize};
use std::num::NonZeroUsize;

/// Worker count used when available parallelism cannot be determined.
pub const DEFAULT_WORKER_FALLBACK: usize = 4;

/// Configuration for [`Bridge`](crate::bridge::Bridge).
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct BridgeConfig {
    /// Maximum number of native calls executing concurrently. Work items
    /// beyond this bound wait in their per-handle queue.
    pub workers: usize,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        let workers = std::thread::available_parallelism()
            .map(NonZeroUsize::get)
            .unwrap_or(DEFAULT_WORKER_FALLBACK);
        Self { workers }
    }
}

impl BridgeConfig {
    /// Config with an explicit worker pool size (clamped to at least 1).
    pub fn with_workers(workers: usize) -> Self {
        Self {
            workers: workers.max(1),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_has_at_least_one_worker() {
        assert!(BridgeConfig::default().workers >= 1);
    }

    #[test]
    fn test_with_workers_clamps_to_one() {
        assert_eq!(BridgeConfig::with_workers(0).workers, 1);
        assert_eq!(BridgeConfig::with_workers(8).workers, 8);
    }
}
