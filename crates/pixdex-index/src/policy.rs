//! Staleness policy: when to trust the persisted tree.

use pixdex_core::{IndexConfig, Sensitivity, Signature};
use serde::{Deserialize, Serialize};

/// What the index knows about a directory.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PersistedState {
    pub signature: Signature,
    /// Whether the children were ever listed.
    pub scanned: bool,
}

/// Why a synchronous rescan is needed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RescanReason {
    /// No record of the directory.
    Unindexed,
    /// Recorded as a child of a scanned directory, never listed itself.
    NeverScanned,
    /// The directory timestamp on disk differs from the record.
    Modified,
}

/// Outcome of [`StalenessPolicy::decide`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    /// Scan now and return the fresh tree.
    Rescan(RescanReason),
    /// The caller's copy is current; send nothing.
    NotModified,
    /// Return the persisted tree, optionally refreshing it in the background.
    Serve { background_rescan: bool },
}

/// Pure staleness decision for one directory.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StalenessPolicy {
    pub sensitivity: Sensitivity,
    pub cached_timeout_ms: u64,
}

impl StalenessPolicy {
    pub fn new(sensitivity: Sensitivity, cached_timeout_ms: u64) -> Self {
        Self {
            sensitivity,
            cached_timeout_ms,
        }
    }

    pub fn from_config(config: &IndexConfig) -> Self {
        Self::new(config.sensitivity, config.cached_timeout_ms)
    }

    /// Decide how to answer a listing request.
    ///
    /// `disk_modified` is the directory's current `max(ctime, mtime)`,
    /// `known` the signature the caller already holds and `now` wall-clock
    /// ms. Rules apply in order: unindexed or never scanned, timestamp
    /// mismatch, caller up to date, serve.
    pub fn decide(
        &self,
        persisted: Option<PersistedState>,
        disk_modified: i64,
        known: Option<Signature>,
        now: i64,
    ) -> Decision {
        let Some(persisted) = persisted else {
            return Decision::Rescan(RescanReason::Unindexed);
        };
        if !persisted.scanned {
            return Decision::Rescan(RescanReason::NeverScanned);
        }
        if persisted.signature.last_modified != disk_modified {
            return Decision::Rescan(RescanReason::Modified);
        }

        let expired = self.is_expired(persisted.signature.last_scanned, now);
        let caller_current = known == Some(persisted.signature);
        let fresh_enough = match self.sensitivity {
            Sensitivity::Low => true,
            Sensitivity::Medium => !expired,
            Sensitivity::High => false,
        };
        if caller_current && fresh_enough {
            return Decision::NotModified;
        }

        let background_rescan = match self.sensitivity {
            Sensitivity::Low => false,
            Sensitivity::Medium => expired,
            Sensitivity::High => true,
        };
        Decision::Serve { background_rescan }
    }

    fn is_expired(&self, last_scanned: Option<i64>, now: i64) -> bool {
        match last_scanned {
            Some(scanned) => {
                let timeout = i64::try_from(self.cached_timeout_ms).unwrap_or(i64::MAX);
                now.saturating_sub(scanned) > timeout
            }
            None => true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const HOUR: u64 = 60 * 60 * 1000;

    fn persisted(last_modified: i64, last_scanned: i64) -> Option<PersistedState> {
        Some(PersistedState {
            signature: Signature::new(last_modified, Some(last_scanned)),
            scanned: true,
        })
    }

    fn policy(sensitivity: Sensitivity) -> StalenessPolicy {
        StalenessPolicy::new(sensitivity, HOUR)
    }

    #[test]
    fn test_unindexed_and_never_scanned() {
        let p = policy(Sensitivity::Low);
        assert_eq!(
            p.decide(None, 10, None, 100),
            Decision::Rescan(RescanReason::Unindexed)
        );

        let unscanned = Some(PersistedState {
            signature: Signature::new(10, None),
            scanned: false,
        });
        assert_eq!(
            p.decide(unscanned, 10, Some(Signature::new(10, None)), 100),
            Decision::Rescan(RescanReason::NeverScanned)
        );
    }

    #[test]
    fn test_disk_mismatch_beats_caller_signature() {
        for sensitivity in [Sensitivity::Low, Sensitivity::Medium, Sensitivity::High] {
            let known = Some(Signature::new(10, Some(50)));
            assert_eq!(
                policy(sensitivity).decide(persisted(10, 50), 11, known, 60),
                Decision::Rescan(RescanReason::Modified)
            );
        }
    }

    #[test]
    fn test_low_sensitivity() {
        let p = policy(Sensitivity::Low);
        let known = Some(Signature::new(10, Some(50)));
        let now = 50 + 100 * HOUR as i64;
        assert_eq!(p.decide(persisted(10, 50), 10, known, now), Decision::NotModified);
        assert_eq!(
            p.decide(persisted(10, 50), 10, None, now),
            Decision::Serve {
                background_rescan: false
            }
        );
        // Stale caller copy.
        assert_eq!(
            p.decide(persisted(10, 50), 10, Some(Signature::new(10, Some(40))), now),
            Decision::Serve {
                background_rescan: false
            }
        );
    }

    #[test]
    fn test_medium_sensitivity_timeout() {
        let p = policy(Sensitivity::Medium);
        let known = Some(Signature::new(10, Some(0)));
        let fresh = HOUR as i64;
        let stale = HOUR as i64 + 1;

        assert_eq!(p.decide(persisted(10, 0), 10, known, fresh), Decision::NotModified);
        assert_eq!(
            p.decide(persisted(10, 0), 10, known, stale),
            Decision::Serve {
                background_rescan: true
            }
        );
        assert_eq!(
            p.decide(persisted(10, 0), 10, None, fresh),
            Decision::Serve {
                background_rescan: false
            }
        );
    }

    #[test]
    fn test_huge_timeout_never_expires() {
        let p = StalenessPolicy::new(Sensitivity::Medium, u64::MAX);
        let known = Some(Signature::new(10, Some(0)));
        assert_eq!(
            p.decide(persisted(10, 0), 10, known, 100 * HOUR as i64),
            Decision::NotModified
        );
    }

    #[test]
    fn test_high_sensitivity_always_refreshes() {
        let p = policy(Sensitivity::High);
        let known = Some(Signature::new(10, Some(50)));
        assert_eq!(
            p.decide(persisted(10, 50), 10, known, 51),
            Decision::Serve {
                background_rescan: true
            }
        );
    }
}
