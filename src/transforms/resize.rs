//! The `resize` factory.
//!
//! | Directive | Meaning |
//! |---|---|
//! | `w`, `h` | Target width / height (integer prefix, > 0) |
//! | `aspect`, `ar` | Target ratio, decimal (`1.5`) or `W:H` (`16:9`) |
//! | `fit`, `position`, `kernel`, `background` | See [`options`](super::options) |
//! | `allowUpscale` | Allow results larger than the source |
//! | `basePixels` | Width of the 1x variant; yields a density descriptor |
//!
//! The final size is resolved against the source at transform time with
//! [`resolve_size`], because the intrinsic size is only known then.

use super::options::{self, background_color, use_flag};
use super::parse::{float_prefix, positive_int_prefix};
use super::{FactoryContext, Transform, transform};
use crate::imaging::{ResizeOptions, SizeRequest, resolve_size};
use crate::resolve::ResolvedConfig;

/// Parse `1.5` or `16:9`. Only strictly positive ratios are accepted.
pub fn parse_aspect(value: &str) -> Option<f64> {
    let ratio = match value.split_once(':') {
        Some((w, h)) => float_prefix(w)? / float_prefix(h)?,
        None => float_prefix(value)?,
    };
    (ratio.is_finite() && ratio > 0.0).then_some(ratio)
}

/// Format a pixel density descriptor such as `2x` or `1.5x`.
fn density_descriptor(width: u32, base_pixels: u32) -> String {
    format!("{}x", width as f64 / base_pixels as f64)
}

pub fn resize(config: &ResolvedConfig, ctx: &mut FactoryContext<'_>) -> Option<Transform> {
    let width = config.get("w").and_then(positive_int_prefix);
    let height = config.get("h").and_then(positive_int_prefix);
    let aspect_key = ["aspect", "ar"]
        .into_iter()
        .find(|key| config.get(key).and_then(parse_aspect).is_some());
    let aspect = aspect_key.and_then(|key| config.get(key)).and_then(parse_aspect);

    if width.is_none() && height.is_none() && aspect.is_none() {
        return None;
    }
    if width.is_some() {
        ctx.use_param("w");
    }
    if height.is_some() {
        ctx.use_param("h");
    }
    if let Some(key) = aspect_key {
        ctx.use_param(key);
    }

    let allow_upscale = use_flag(config, ctx, "allowUpscale");
    if config.get("allowUpscale") == Some("false") {
        ctx.use_param("allowUpscale");
    }
    let base_pixels = config.get("basePixels").and_then(positive_int_prefix);
    if base_pixels.is_some() {
        ctx.use_param("basePixels");
    }

    let fit = options::fit(config, ctx).unwrap_or_default();
    let position = options::position(config, ctx).unwrap_or_default();
    let kernel = options::kernel(config, ctx).unwrap_or_default();
    let background = options::background(config, ctx);

    let request = SizeRequest {
        width,
        height,
        aspect,
        allow_upscale,
    };

    Some(transform(move |image, meta| {
        let source = image.metadata();
        let Some((width, height)) = resolve_size((source.width, source.height), &request) else {
            return Ok(());
        };
        image.resize(&ResizeOptions {
            width,
            height,
            fit,
            position,
            kernel,
            background: background_color(background.as_deref()),
        })?;

        if let Some(raw) = &background {
            meta.background_directive = Some(raw.clone());
        }
        if let Some(base) = base_pixels {
            meta.pixel_density_descriptor = Some(density_descriptor(width, base));
        }
        Ok(())
    }))
}
