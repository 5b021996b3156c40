//! Container probing: `ffprobe` for videos, `image` for photo dimensions.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::process::Command;

use serde::{Deserialize, Deserializer, Serialize};

use crate::error::{MetadataError, Result};
use crate::parser::{DimensionProbe, VideoProber};

/// Streams and format of a container, in `ffprobe` JSON shape.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProbeReport {
    #[serde(default)]
    pub streams: Vec<ProbeStream>,
    #[serde(default)]
    pub format: Option<ProbeFormat>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProbeStream {
    #[serde(default)]
    pub width: Option<u32>,
    #[serde(default)]
    pub height: Option<u32>,
    /// Seconds.
    #[serde(default, deserialize_with = "lenient_f64")]
    pub duration: Option<f64>,
    #[serde(default, deserialize_with = "lenient_u64")]
    pub bit_rate: Option<u64>,
    /// `num/den` fraction.
    #[serde(default)]
    pub avg_frame_rate: Option<String>,
    #[serde(default)]
    pub r_frame_rate: Option<String>,
    #[serde(default)]
    pub tags: BTreeMap<String, String>,
    #[serde(default)]
    pub side_data_list: Vec<SideData>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SideData {
    #[serde(default, deserialize_with = "lenient_f64")]
    pub rotation: Option<f64>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProbeFormat {
    #[serde(default, deserialize_with = "lenient_f64")]
    pub duration: Option<f64>,
    #[serde(default, deserialize_with = "lenient_u64")]
    pub bit_rate: Option<u64>,
    #[serde(default)]
    pub tags: BTreeMap<String, String>,
}

impl ProbeStream {
    /// Rotation in degrees from the `rotate` tag or the display matrix side data.
    pub fn rotation(&self) -> Option<i64> {
        if let Some(rotate) = self.tags.get("rotate").and_then(|r| r.trim().parse::<f64>().ok()) {
            return Some(rotate.round() as i64);
        }
        self.side_data_list
            .iter()
            .find_map(|side| side.rotation)
            .map(|r| r.round() as i64)
    }

    /// Frames per second from the average frame rate, else the raw one.
    pub fn fps(&self) -> Option<f64> {
        [&self.avg_frame_rate, &self.r_frame_rate]
            .into_iter()
            .flatten()
            .find_map(|rate| parse_fraction(rate))
    }

    pub fn creation_time(&self) -> Option<&str> {
        self.tags.get("creation_time").map(String::as_str)
    }
}

impl ProbeFormat {
    pub fn creation_time(&self) -> Option<&str> {
        self.tags.get("creation_time").map(String::as_str)
    }
}

/// Parse a `num/den` rate; zero or non-finite results are rejected.
pub fn parse_fraction(rate: &str) -> Option<f64> {
    let value = match rate.split_once('/') {
        Some((num, den)) => {
            let num: f64 = num.trim().parse().ok()?;
            let den: f64 = den.trim().parse().ok()?;
            if den == 0.0 {
                return None;
            }
            num / den
        }
        None => rate.trim().parse().ok()?,
    };
    (value.is_finite() && value > 0.0).then_some(value)
}

// ffprobe emits numbers as strings ("12.345"), sometimes "N/A".
fn lenient_f64<'de, D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Option<f64>, D::Error> {
    Ok(match Option::<serde_json::Value>::deserialize(deserializer)? {
        Some(serde_json::Value::Number(n)) => n.as_f64(),
        Some(serde_json::Value::String(s)) => s.trim().parse().ok(),
        _ => None,
    })
}

fn lenient_u64<'de, D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Option<u64>, D::Error> {
    Ok(match Option::<serde_json::Value>::deserialize(deserializer)? {
        Some(serde_json::Value::Number(n)) => n.as_u64(),
        Some(serde_json::Value::String(s)) => s.trim().parse().ok(),
        _ => None,
    })
}

/// Runs the `ffprobe` binary and decodes its JSON report.
#[derive(Debug, Clone)]
pub struct FfprobeProber {
    binary: PathBuf,
}

impl FfprobeProber {
    pub fn new(binary: impl Into<PathBuf>) -> Self {
        Self {
            binary: binary.into(),
        }
    }
}

impl Default for FfprobeProber {
    fn default() -> Self {
        Self::new("ffprobe")
    }
}

impl VideoProber for FfprobeProber {
    fn probe(&self, path: &Path) -> Result<ProbeReport> {
        let output = Command::new(&self.binary)
            .args(["-v", "quiet", "-print_format", "json", "-show_streams", "-show_format"])
            .arg(path)
            .output()
            .map_err(|e| MetadataError::Probe {
                path: path.to_path_buf(),
                message: format!("failed to run {}: {e}", self.binary.display()),
            })?;

        if !output.status.success() {
            return Err(MetadataError::Probe {
                path: path.to_path_buf(),
                message: format!("{} exited with {}", self.binary.display(), output.status),
            });
        }

        serde_json::from_slice(&output.stdout).map_err(|e| MetadataError::Probe {
            path: path.to_path_buf(),
            message: e.to_string(),
        })
    }
}

/// Decodes just enough of an image to learn its dimensions.
#[derive(Debug, Clone, Copy, Default)]
pub struct ImageDimensionProbe;

impl DimensionProbe for ImageDimensionProbe {
    fn dimensions(&self, path: &Path) -> Result<(u32, u32)> {
        image::image_dimensions(path).map_err(|e| MetadataError::Probe {
            path: path.to_path_buf(),
            message: e.to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const REPORT: &str = r#"{
        "streams": [
            {"codec_type": "audio", "duration": "10.0", "bit_rate": "128000", "tags": {}},
            {
                "codec_type": "video",
                "width": 1920,
                "height": 1080,
                "duration": "12.345",
                "bit_rate": "8000000",
                "avg_frame_rate": "30000/1001",
                "r_frame_rate": "30/1",
                "tags": {"creation_time": "2021-06-01T10:00:00.000000Z"},
                "side_data_list": [{"side_data_type": "Display Matrix", "rotation": -90}]
            }
        ],
        "format": {"duration": "12.4", "bit_rate": "N/A", "tags": {"major_brand": "qt"}}
    }"#;

    #[test]
    fn test_decode_report() {
        let report: ProbeReport = serde_json::from_str(REPORT).unwrap();
        assert_eq!(report.streams.len(), 2);
        let video = &report.streams[1];
        assert_eq!(video.width, Some(1920));
        assert_eq!(video.duration, Some(12.345));
        assert_eq!(video.bit_rate, Some(8_000_000));
        assert_eq!(video.rotation(), Some(-90));
        assert_eq!(video.creation_time(), Some("2021-06-01T10:00:00.000000Z"));

        let format = report.format.unwrap();
        assert_eq!(format.bit_rate, None);
        assert_eq!(format.creation_time(), None);
    }

    #[test]
    fn test_rotate_tag_wins() {
        let mut stream = ProbeStream::default();
        stream.tags.insert("rotate".into(), "270".into());
        stream.side_data_list.push(SideData { rotation: Some(90.0) });
        assert_eq!(stream.rotation(), Some(270));
    }

    #[test]
    fn test_fps_fraction() {
        let stream = ProbeStream {
            avg_frame_rate: Some("0/0".into()),
            r_frame_rate: Some("25/1".into()),
            ..ProbeStream::default()
        };
        assert_eq!(stream.fps(), Some(25.0));
        assert_eq!(parse_fraction("bogus"), None);
        assert!((parse_fraction("30000/1001").unwrap() - 29.97).abs() < 0.01);
    }

    #[test]
    fn test_missing_binary_is_probe_error() {
        let prober = FfprobeProber::new("/nonexistent/ffprobe-binary");
        let err = prober.probe(Path::new("clip.mp4")).unwrap_err();
        assert!(matches!(err, MetadataError::Probe { .. }));
    }
}
