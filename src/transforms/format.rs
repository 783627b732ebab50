//! The `format` factory: output encoding and its settings.

use super::options;
use super::{FactoryContext, Transform, transform};
use crate::imaging::{FormatOptions, TargetFormat};
use crate::resolve::ResolvedConfig;

/// `format=<avif|jpg|jpeg|png|heif|heic|webp|tiff|gif>`, with `quality`,
/// `progressive` and `lossless` applied to the chosen encoder.
pub fn format(config: &ResolvedConfig, ctx: &mut FactoryContext<'_>) -> Option<Transform> {
    let target = config.get("format").and_then(TargetFormat::parse)?;
    ctx.use_param("format");

    let encoding = FormatOptions {
        format: target,
        quality: options::quality(config, ctx),
        progressive: options::progressive(config, ctx).unwrap_or(false),
        lossless: options::lossless(config, ctx).unwrap_or(false),
    };

    Some(transform(move |image, meta| {
        meta.quality = encoding.quality.map(|q| q.value());
        meta.progressive = encoding.progressive.then_some(true);
        meta.lossless = encoding.lossless.then_some(true);
        image.set_format(&encoding)
    }))
}
