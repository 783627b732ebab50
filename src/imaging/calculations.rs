//! Pure calculation functions for image dimensions.
//!
//! All functions here are pure and testable without any I/O or images.

/// Calculate dimensions needed to fill a target area (resize before crop).
///
/// Returns dimensions that completely cover the target area while maintaining
/// the source aspect ratio. One dimension will match exactly, the other may exceed.
///
/// # Arguments
/// * `source` - Original image dimensions (width, height)
/// * `target` - Target area dimensions (width, height)
///
/// # Returns
/// * `(width, height)` - Fill dimensions (at least one matches target)
pub fn calculate_fill_dimensions(source: (u32, u32), target: (u32, u32)) -> (u32, u32) {
    let (src_w, src_h) = source;
    let (tgt_w, tgt_h) = target;

    let src_aspect = src_w as f64 / src_h as f64;
    let tgt_aspect = tgt_w as f64 / tgt_h as f64;

    if src_aspect > tgt_aspect {
        // Source is wider: height will match, width will exceed
        let h = tgt_h;
        let w = (h as f64 * src_aspect).round() as u32;
        (w, h)
    } else {
        // Source is taller: width will match, height will exceed
        let w = tgt_w;
        let h = (w as f64 / src_aspect).round() as u32;
        (w, h)
    }
}

/// Calculate the largest dimensions that fit inside a target area.
///
/// The counterpart of [`calculate_fill_dimensions`]: one dimension matches
/// the target exactly, the other is smaller or equal.
pub fn calculate_fit_dimensions(source: (u32, u32), target: (u32, u32)) -> (u32, u32) {
    let (src_w, src_h) = source;
    let (tgt_w, tgt_h) = target;

    let src_aspect = src_w as f64 / src_h as f64;
    let tgt_aspect = tgt_w as f64 / tgt_h as f64;

    if src_aspect > tgt_aspect {
        let w = tgt_w;
        let h = ((w as f64 / src_aspect).round() as u32).max(1);
        (w, h)
    } else {
        let h = tgt_h;
        let w = ((h as f64 * src_aspect).round() as u32).max(1);
        (w, h)
    }
}

/// Requested size for a resize, before it is resolved against the source.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct SizeRequest {
    pub width: Option<u32>,
    pub height: Option<u32>,
    /// Width divided by height.
    pub aspect: Option<f64>,
    pub allow_upscale: bool,
}

/// Resolve a [`SizeRequest`] against the intrinsic dimensions of the source.
///
/// - Aspect only: the largest crop of the source frame with that ratio.
/// - Width and height: used as given (aspect ignored).
/// - One dimension plus aspect: the other dimension is derived from the aspect.
/// - One dimension alone: the other follows the source ratio.
///
/// Unless upscaling is allowed, a result larger than the source is scaled down
/// until it fits, keeping the requested ratio.
///
/// Returns `None` when the request names no dimension at all.
pub fn resolve_size(intrinsic: (u32, u32), request: &SizeRequest) -> Option<(u32, u32)> {
    let (orig_w, orig_h) = (intrinsic.0 as f64, intrinsic.1.max(1) as f64);
    let orig_aspect = orig_w / orig_h;

    let (mut w, mut h) = match (request.width, request.height, request.aspect) {
        (Some(w), Some(h), _) => (w as f64, h as f64),
        (Some(w), None, Some(aspect)) => (w as f64, w as f64 / aspect),
        (None, Some(h), Some(aspect)) => (h as f64 * aspect, h as f64),
        (Some(w), None, None) => (w as f64, w as f64 / orig_aspect),
        (None, Some(h), None) => (h as f64 * orig_aspect, h as f64),
        (None, None, Some(aspect)) => {
            if aspect > orig_aspect {
                (orig_w, orig_w / aspect)
            } else {
                (orig_h * aspect, orig_h)
            }
        }
        (None, None, None) => return None,
    };

    if !request.allow_upscale && (w > orig_w || h > orig_h) {
        let scale = (orig_w / w).min(orig_h / h);
        w *= scale;
        h *= scale;
    }

    Some((
        (w.round() as u32).max(1),
        (h.round() as u32).max(1),
    ))
}

/// Offset of an `inner` box inside an `outer` box for a given anchor.
///
/// Anchors are fractions in `[0, 1]` (0 = left/top, 1 = right/bottom). Used
/// both for cropping (`inner` is the crop window) and for padding (`inner`
/// is the placed image).
pub fn anchor_offset(outer: (u32, u32), inner: (u32, u32), anchor: (f64, f64)) -> (u32, u32) {
    let free_x = outer.0.saturating_sub(inner.0) as f64;
    let free_y = outer.1.saturating_sub(inner.1) as f64;
    (
        (free_x * anchor.0).round() as u32,
        (free_y * anchor.1).round() as u32,
    )
}

/// Bounding box of a `width`×`height` image rotated by `degrees`.
pub fn rotated_bounds(width: u32, height: u32, degrees: f64) -> (u32, u32) {
    let radians = degrees.to_radians();
    let (sin, cos) = (radians.sin().abs(), radians.cos().abs());
    let (w, h) = (width as f64, height as f64);
    (
        ((w * cos + h * sin).round() as u32).max(1),
        ((w * sin + h * cos).round() as u32).max(1),
    )
}
