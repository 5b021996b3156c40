//! Scan progress reporting.

use std::path::PathBuf;
use std::time::Duration;

/// Stage a scan is in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScanPhase {
    /// Walking the directory tree and classifying entries.
    Listing,
    /// Reading metadata from media files.
    Extracting,
    /// Scan finished.
    Done,
}

/// Progress information during a scan.
#[derive(Debug, Clone)]
pub struct ScanProgress {
    pub phase: ScanPhase,
    /// Directories listed so far.
    pub dirs_listed: u64,
    /// Media files extracted so far.
    pub media_extracted: u64,
    /// Media files found by the listing.
    pub media_total: u64,
    /// Bytes of media extracted so far.
    pub bytes_extracted: u64,
    /// Most recent path visited.
    pub current_path: PathBuf,
    /// Number of warnings encountered.
    pub warnings_count: u64,
    /// Time elapsed since the scan started.
    pub elapsed: Duration,
}

impl ScanProgress {
    /// Create initial progress state.
    pub fn new() -> Self {
        Self {
            phase: ScanPhase::Listing,
            dirs_listed: 0,
            media_extracted: 0,
            media_total: 0,
            bytes_extracted: 0,
            current_path: PathBuf::new(),
            warnings_count: 0,
            elapsed: Duration::ZERO,
        }
    }

    /// Extraction rate in media files per second.
    pub fn media_per_second(&self) -> f64 {
        if self.elapsed.as_secs_f64() > 0.0 {
            self.media_extracted as f64 / self.elapsed.as_secs_f64()
        } else {
            0.0
        }
    }

    /// Fraction of media extracted, 0.0 to 1.0.
    pub fn fraction_done(&self) -> f64 {
        if self.media_total == 0 {
            if self.phase == ScanPhase::Done { 1.0 } else { 0.0 }
        } else {
            self.media_extracted as f64 / self.media_total as f64
        }
    }
}

impl Default for ScanProgress {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rates() {
        let progress = ScanProgress {
            phase: ScanPhase::Extracting,
            media_extracted: 50,
            media_total: 200,
            elapsed: Duration::from_secs(5),
            ..ScanProgress::new()
        };
        assert_eq!(progress.media_per_second(), 10.0);
        assert_eq!(progress.fraction_done(), 0.25);
        assert_eq!(ScanProgress::new().media_per_second(), 0.0);
    }
}
