//! Normalized metadata records for photos and videos.

use compact_str::CompactString;
use indexmap::IndexSet;
use serde::{Deserialize, Serialize};

/// Keyword set: exact-match deduplication, case preserved, order irrelevant.
pub type Keywords = IndexSet<String>;

/// Highest rating a record can carry.
pub const MAX_RATING: u8 = 5;

/// Clamp any declared rating into `0..=5`.
pub fn clamp_rating(raw: i64) -> u8 {
    raw.clamp(0, i64::from(MAX_RATING)) as u8
}

/// Display size of a media item.
///
/// Both sides are at least 1 and reflect the upright orientation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MediaSize {
    pub width: u32,
    pub height: u32,
}

impl MediaSize {
    /// Size used when nothing better is known.
    pub const UNKNOWN: MediaSize = MediaSize {
        width: 1,
        height: 1,
    };

    /// Create a size, flooring each side at 1.
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width: width.max(1),
            height: height.max(1),
        }
    }

    /// The same size with width and height exchanged.
    pub fn swapped(self) -> Self {
        Self {
            width: self.height,
            height: self.width,
        }
    }
}

impl Default for MediaSize {
    fn default() -> Self {
        Self::UNKNOWN
    }
}

/// Camera and exposure data. Every field is present only if valid.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CameraData {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub make: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lens: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub iso: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub focal_length: Option<f32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exposure: Option<f32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub f_stop: Option<f32>,
}

impl CameraData {
    /// True when no field was resolved.
    pub fn is_empty(&self) -> bool {
        self.make.is_none()
            && self.model.is_none()
            && self.lens.is_none()
            && self.iso.is_none()
            && self.focal_length.is_none()
            && self.exposure.is_none()
            && self.f_stop.is_none()
    }
}

/// GPS coordinates in decimal degrees, rounded to six places.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct GpsData {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub latitude: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub longitude: Option<f64>,
}

impl GpsData {
    pub fn is_empty(&self) -> bool {
        self.latitude.is_none() && self.longitude.is_none()
    }
}

/// Where a photo was taken.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PositionData {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub country: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub state: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub city: Option<String>,
    #[serde(default, rename = "GPSData", skip_serializing_if = "Option::is_none")]
    pub gps: Option<GpsData>,
}

impl PositionData {
    pub fn is_empty(&self) -> bool {
        self.country.is_none()
            && self.state.is_none()
            && self.city.is_none()
            && self.gps.is_none_or(|gps| gps.is_empty())
    }
}

/// Pixel rectangle anchored at its top-left corner.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FaceBox {
    pub left: u32,
    pub top: u32,
    pub width: u32,
    pub height: u32,
}

/// A named face detected in a photo.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FaceRegion {
    pub name: String,
    #[serde(rename = "box")]
    pub bounds: FaceBox,
}

/// Normalized photo metadata.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PhotoMetadata {
    pub size: MediaSize,
    /// Milliseconds since the Unix epoch, 0 when unknown.
    pub creation_date: i64,
    /// UTC offset (`+HH:MM`) the creation date was resolved with.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub creation_date_offset: Option<String>,
    pub file_size: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub camera_data: Option<CameraData>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub position_data: Option<PositionData>,
    #[serde(default, skip_serializing_if = "IndexSet::is_empty")]
    pub keywords: Keywords,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rating: Option<u8>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub faces: Vec<FaceRegion>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub caption: Option<String>,
}

impl PhotoMetadata {
    /// Record returned for a file whose header could not be read at all.
    pub fn sentinel(file_size: u64) -> Self {
        Self {
            file_size,
            ..Self::default()
        }
    }
}

/// Normalized video metadata.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VideoMetadata {
    pub size: MediaSize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bit_rate: Option<u64>,
    /// Duration in milliseconds.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fps: Option<f64>,
    pub creation_date: i64,
    pub file_size: u64,
    #[serde(default, skip_serializing_if = "IndexSet::is_empty")]
    pub keywords: Keywords,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rating: Option<u8>,
}

/// Kind of media entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MediaKind {
    Photo,
    Video,
}

/// Metadata of either media kind.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum MediaMetadata {
    Photo(PhotoMetadata),
    Video(VideoMetadata),
}

impl MediaMetadata {
    pub fn kind(&self) -> MediaKind {
        match self {
            MediaMetadata::Photo(_) => MediaKind::Photo,
            MediaMetadata::Video(_) => MediaKind::Video,
        }
    }

    pub fn size(&self) -> MediaSize {
        match self {
            MediaMetadata::Photo(photo) => photo.size,
            MediaMetadata::Video(video) => video.size,
        }
    }

    pub fn creation_date(&self) -> i64 {
        match self {
            MediaMetadata::Photo(photo) => photo.creation_date,
            MediaMetadata::Video(video) => video.creation_date,
        }
    }

    pub fn file_size(&self) -> u64 {
        match self {
            MediaMetadata::Photo(photo) => photo.file_size,
            MediaMetadata::Video(video) => video.file_size,
        }
    }

    pub fn keywords(&self) -> &Keywords {
        match self {
            MediaMetadata::Photo(photo) => &photo.keywords,
            MediaMetadata::Video(video) => &video.keywords,
        }
    }

    pub fn rating(&self) -> Option<u8> {
        match self {
            MediaMetadata::Photo(photo) => photo.rating,
            MediaMetadata::Video(video) => video.rating,
        }
    }
}

/// A photo or video inside a directory.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MediaItem {
    /// File name (not full path).
    pub name: CompactString,
    pub metadata: MediaMetadata,
}

impl MediaItem {
    pub fn new(name: impl Into<CompactString>, metadata: MediaMetadata) -> Self {
        Self {
            name: name.into(),
            metadata,
        }
    }

    pub fn kind(&self) -> MediaKind {
        self.metadata.kind()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_media_size_floor() {
        let size = MediaSize::new(0, 0);
        assert_eq!(size, MediaSize::UNKNOWN);
        assert_eq!(MediaSize::new(4000, 3000).swapped(), MediaSize::new(3000, 4000));
    }

    #[test]
    fn test_clamp_rating() {
        assert_eq!(clamp_rating(-1), 0);
        assert_eq!(clamp_rating(3), 3);
        assert_eq!(clamp_rating(42), 5);
    }

    #[test]
    fn test_keywords_compare_as_sets() {
        let mut a = PhotoMetadata::default();
        a.keywords.insert("beach".to_string());
        a.keywords.insert("Sunset".to_string());

        let mut b = PhotoMetadata::default();
        b.keywords.insert("Sunset".to_string());
        b.keywords.insert("beach".to_string());
        b.keywords.insert("beach".to_string());

        assert_eq!(b.keywords.len(), 2);
        assert_eq!(a, b);
    }

    #[test]
    fn test_sentinel_record() {
        let sentinel = PhotoMetadata::sentinel(512);
        assert_eq!(sentinel.size, MediaSize::UNKNOWN);
        assert_eq!(sentinel.creation_date, 0);
        assert_eq!(sentinel.file_size, 512);
        assert!(sentinel.camera_data.is_none());
        assert!(sentinel.keywords.is_empty());
    }

    #[test]
    fn test_serialized_shape() {
        let item = MediaItem::new(
            "a.jpg",
            MediaMetadata::Photo(PhotoMetadata {
                size: MediaSize::new(10, 20),
                ..PhotoMetadata::default()
            }),
        );
        let json = serde_json::to_value(&item).unwrap();
        assert_eq!(json["metadata"]["type"], "photo");
        assert_eq!(json["metadata"]["size"]["height"], 20);
        assert!(json["metadata"].get("cameraData").is_none());
    }
}
