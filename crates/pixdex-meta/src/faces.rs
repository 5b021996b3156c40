//! Face regions: ratio areas to corner-anchored pixel boxes.

use pixdex_core::{FaceBox, FaceRegion, Keywords, MediaSize, Orientation};

use crate::sections::{RegionArea, RegionEntry};

const FACE_TYPE: &str = "Face";

/// Apply an orientation to a ratio area so it lines up with the upright image.
pub fn orient_area(area: RegionArea, orientation: Orientation) -> RegionArea {
    let transform = orientation.transform();
    let RegionArea {
        mut x,
        mut y,
        mut w,
        mut h,
    } = area;
    if transform.swap_axes {
        std::mem::swap(&mut x, &mut y);
        std::mem::swap(&mut w, &mut h);
    }
    if transform.mirror_x {
        x = 1.0 - x;
    }
    if transform.mirror_y {
        y = 1.0 - y;
    }
    RegionArea { x, y, w, h }
}

/// Pixel box whose left/top are the center minus half the extent.
///
/// Values may be negative for regions touching the image edge.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CenteredBox {
    pub left: i64,
    pub top: i64,
    pub width: i64,
    pub height: i64,
}

/// Scale an upright ratio area to pixels.
pub fn centered_box(area: RegionArea, size: MediaSize) -> CenteredBox {
    let (image_w, image_h) = (f64::from(size.width), f64::from(size.height));
    let width = (area.w * image_w).round().max(0.0);
    let height = (area.h * image_h).round().max(0.0);
    CenteredBox {
        left: (area.x * image_w - width / 2.0).round() as i64,
        top: (area.y * image_h - height / 2.0).round() as i64,
        width: width as i64,
        height: height as i64,
    }
}

/// Shift a centered box by half its extent to the corner anchor, clamped at 0.
pub fn corner_box(centered: CenteredBox) -> FaceBox {
    let clamp = |v: i64| u32::try_from(v.max(0)).unwrap_or(u32::MAX);
    FaceBox {
        left: clamp(centered.left - centered.width / 2),
        top: clamp(centered.top - centered.height / 2),
        width: clamp(centered.width),
        height: clamp(centered.height),
    }
}

/// Named face regions from a region list.
///
/// `size` is the final, upright photo size.
pub fn face_regions(
    regions: &[RegionEntry],
    size: MediaSize,
    orientation: Orientation,
) -> Vec<FaceRegion> {
    regions
        .iter()
        .filter_map(RegionEntry::fields)
        .filter(|fields| fields.kind.as_deref() == Some(FACE_TYPE))
        .filter_map(|fields| {
            let name = fields.name.as_deref()?.trim();
            if name.is_empty() {
                return None;
            }
            let area = orient_area(fields.area?, orientation);
            Some(FaceRegion {
                name: name.to_string(),
                bounds: corner_box(centered_box(area, size)),
            })
        })
        .collect()
}

/// Drop keywords that name a detected face.
pub fn remove_face_keywords(keywords: &mut Keywords, faces: &[FaceRegion]) {
    keywords.retain(|keyword| !faces.iter().any(|face| face.name == *keyword));
}
