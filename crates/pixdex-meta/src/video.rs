//! Video metadata extraction.

use std::path::Path;

use pixdex_core::{MediaSize, VideoMetadata, system_time_millis};
use tracing::debug;

use crate::datetime::parse_instant;
use crate::parser::Parsers;
use crate::probe::ProbeReport;
use crate::sidecar::read_sidecars;

/// Extracts a normalized [`VideoMetadata`] from one video file.
#[derive(Debug, Clone)]
pub struct VideoExtractor {
    parsers: Parsers,
}

impl VideoExtractor {
    pub fn new(parsers: Parsers) -> Self {
        Self { parsers }
    }

    /// Extract the record for `path`. A failed probe leaves the file's
    /// modification time as creation date and a 1×1 size.
    pub fn extract(&self, path: &Path) -> VideoMetadata {
        let stat = std::fs::metadata(path).ok();
        let mut video = VideoMetadata {
            file_size: stat.as_ref().map_or(0, |m| m.len()),
            creation_date: stat
                .as_ref()
                .and_then(|m| m.modified().ok())
                .map_or(0, system_time_millis),
            ..VideoMetadata::default()
        };

        match self.parsers.video.probe(path) {
            Ok(report) => apply_probe(&report, &mut video),
            Err(e) => debug!(path = %path.display(), error = %e, "Video probe failed"),
        }

        read_sidecars(path, self.parsers.sidecar.as_ref())
            .apply(&mut video.keywords, &mut video.rating);
        video
    }
}

fn seconds_to_millis(seconds: f64) -> Option<u64> {
    (seconds.is_finite() && seconds >= 0.0).then(|| (seconds * 1000.0).round() as u64)
}

fn apply_probe(report: &ProbeReport, video: &mut VideoMetadata) {
    let stream = report
        .streams
        .iter()
        .find(|stream| stream.width.is_some_and(|w| w > 0));
    let format = report.format.as_ref();

    if let Some(stream) = stream {
        let size = MediaSize::new(stream.width.unwrap_or(1), stream.height.unwrap_or(1));
        let quarter_turn = stream.rotation().is_some_and(|r| r.abs() % 180 == 90);
        video.size = if quarter_turn { size.swapped() } else { size };
        video.fps = stream.fps();
    }

    video.duration = stream
        .and_then(|s| s.duration)
        .filter(|seconds| *seconds > 0.0)
        .or_else(|| format.and_then(|f| f.duration))
        .and_then(seconds_to_millis);
    video.bit_rate = format
        .and_then(|f| f.bit_rate)
        .or_else(|| stream.and_then(|s| s.bit_rate));

    let created = stream
        .and_then(|s| s.creation_time())
        .and_then(parse_instant)
        .or_else(|| format.and_then(|f| f.creation_time()).and_then(parse_instant));
    if let Some(created) = created {
        video.creation_date = created;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::probe::{ProbeFormat, ProbeStream, SideData};

    fn stream(width: u32, height: u32) -> ProbeStream {
        ProbeStream {
            width: Some(width),
            height: Some(height),
            ..ProbeStream::default()
        }
    }

    #[test]
    fn test_rotation_swaps_size() {
        for (rotation, expected) in [(90.0, (1080, 1920)), (-270.0, (1080, 1920)), (180.0, (1920, 1080))] {
            let mut video_stream = stream(1920, 1080);
            video_stream.side_data_list.push(SideData {
                rotation: Some(rotation),
            });
            let report = ProbeReport {
                streams: vec![video_stream],
                format: None,
            };
            let mut video = VideoMetadata::default();
            apply_probe(&report, &mut video);
            assert_eq!((video.size.width, video.size.height), expected, "rotation {rotation}");
        }
    }

    #[test]
    fn test_stream_and_format_precedence() {
        let mut audio = ProbeStream::default();
        audio.bit_rate = Some(128_000);
        let mut picture = stream(640, 480);
        picture.bit_rate = Some(900_000);
        picture.avg_frame_rate = Some("25/1".into());
        let mut format = ProbeFormat {
            duration: Some(3.5),
            bit_rate: Some(1_000_000),
            ..ProbeFormat::default()
        };
        format
            .tags
            .insert("creation_time".into(), "1970-01-01T00:00:02Z".into());

        let report = ProbeReport {
            streams: vec![audio, picture],
            format: Some(format),
        };
        let mut video = VideoMetadata {
            creation_date: 99,
            ..VideoMetadata::default()
        };
        apply_probe(&report, &mut video);

        assert_eq!(video.size, MediaSize::new(640, 480));
        assert_eq!(video.duration, Some(3500));
        assert_eq!(video.bit_rate, Some(1_000_000));
        assert_eq!(video.fps, Some(25.0));
        assert_eq!(video.creation_date, 2000);
    }

    #[test]
    fn test_zero_stream_duration_uses_format() {
        let mut picture = stream(640, 480);
        picture.duration = Some(0.0);
        let report = ProbeReport {
            streams: vec![picture],
            format: Some(ProbeFormat {
                duration: Some(4.0),
                ..ProbeFormat::default()
            }),
        };
        let mut video = VideoMetadata::default();
        apply_probe(&report, &mut video);
        assert_eq!(video.duration, Some(4000));
    }

    #[test]
    fn test_unparsable_stream_date_falls_back_to_format() {
        let mut picture = stream(640, 480);
        picture.tags.insert("creation_time".into(), "garbage".into());
        let mut format = ProbeFormat::default();
        format
            .tags
            .insert("creation_time".into(), "1970-01-01T00:00:02Z".into());
        let report = ProbeReport {
            streams: vec![picture],
            format: Some(format),
        };
        let mut video = VideoMetadata {
            creation_date: 99,
            ..VideoMetadata::default()
        };
        apply_probe(&report, &mut video);
        assert_eq!(video.creation_date, 2000);
    }

    #[test]
    fn test_empty_report_keeps_defaults() {
        let mut video = VideoMetadata {
            creation_date: 42,
            ..VideoMetadata::default()
        };
        apply_probe(&ProbeReport::default(), &mut video);
        assert_eq!(video.size, MediaSize::UNKNOWN);
        assert_eq!(video.creation_date, 42);
        assert_eq!(video.duration, None);
    }
}
