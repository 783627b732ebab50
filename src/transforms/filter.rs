//! Convolution factories: `blur`, `median`.

use super::parse::{float_prefix, positive_int_prefix};
use super::{FactoryContext, Transform, transform};
use crate::metadata::BlurAnnotation;
use crate::resolve::ResolvedConfig;

/// Window size used by a bare `median`.
pub const DEFAULT_MEDIAN: u32 = 3;

/// Largest accepted median window. The filter sorts `size²` samples per pixel.
pub const MAX_MEDIAN: u32 = 25;

/// `blur`: a positive sigma for a gaussian blur, or `""` / `true` for the
/// backend's mild default blur.
pub fn blur(config: &ResolvedConfig, ctx: &mut FactoryContext<'_>) -> Option<Transform> {
    let annotation = match config.get("blur")? {
        "" | "true" => BlurAnnotation::Default(true),
        value => {
            let sigma = float_prefix(value).filter(|s| *s > 0.0 && s.is_finite())?;
            BlurAnnotation::Sigma(sigma as f32)
        }
    };
    ctx.use_param("blur");

    Some(transform(move |image, meta| {
        meta.blur = Some(annotation);
        match annotation {
            BlurAnnotation::Sigma(sigma) => image.blur(Some(sigma)),
            BlurAnnotation::Default(_) => image.blur(None),
        }
    }))
}

/// `median`: `""` / `true` for a 3×3 window, or a positive window size up
/// to [`MAX_MEDIAN`].
pub fn median(config: &ResolvedConfig, ctx: &mut FactoryContext<'_>) -> Option<Transform> {
    let size = match config.get("median")? {
        "" | "true" => DEFAULT_MEDIAN,
        value => positive_int_prefix(value)?,
    };
    ctx.use_param("median");
    if size > MAX_MEDIAN {
        ctx.logger()
            .warn(&format!("median window {size} exceeds the limit of {MAX_MEDIAN}, skipped"));
        return None;
    }

    Some(transform(move |image, meta| {
        meta.median = Some(size);
        image.median(size)
    }))
}
