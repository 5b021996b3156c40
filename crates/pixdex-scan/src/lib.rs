//! Directory scanning for pixdex.
//!
//! This crate walks a directory with jwalk, classifies every entry as
//! subdirectory, photo, video or ignored, and extracts media metadata in
//! parallel on the rayon pool.
//!
//! # Overview
//!
//! - **Parallel traversal** via jwalk
//! - **Parallel extraction** via rayon, one task per media file
//! - **Depth limits**: directories past `max_depth` are listed unscanned
//! - **Progress updates** via broadcast channels
//!
//! # Example
//!
//! ```rust,no_run
//! use pixdex_scan::{DirectoryScanner, Parsers, ScanConfig};
//!
//! let scanner = DirectoryScanner::new(ScanConfig::default(), Parsers::new()).unwrap();
//! let report = scanner.scan("/photos".as_ref()).unwrap();
//!
//! println!("Photos: {}", report.stats.photos);
//! println!("Videos: {}", report.stats.videos);
//! ```
//!
//! # Progress Monitoring
//!
//! ```rust,no_run
//! use pixdex_scan::{DirectoryScanner, Parsers, ScanConfig};
//!
//! let scanner = DirectoryScanner::new(ScanConfig::default(), Parsers::new()).unwrap();
//! let mut progress_rx = scanner.subscribe();
//!
//! tokio::spawn(async move {
//!     while let Ok(progress) = progress_rx.recv().await {
//!         println!("Extracted {} of {}", progress.media_extracted, progress.media_total);
//!     }
//! });
//! ```

mod progress;
mod scanner;

pub use progress::{ScanPhase, ScanProgress};
pub use scanner::{DirectoryScanner, last_modified, stat_directory};

// Re-export core types for convenience
pub use pixdex_core::{
    DirectoryNode, MediaItem, ScanConfig, ScanError, ScanReport, ScanStats, ScanWarning,
    WarningKind,
};
pub use pixdex_meta::Parsers;
