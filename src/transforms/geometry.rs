//! Orientation factories: `rotate`, `flip`, `flop`.

use super::options::{self, background_color, use_flag};
use super::parse::int_prefix;
use super::{FactoryContext, Transform, transform};
use crate::resolve::ResolvedConfig;

/// `rotate=<degrees>`: integer prefix, truncated. Zero is a no-op and
/// declines. Non-right angles fill the exposed corners with `background`.
pub fn rotate(config: &ResolvedConfig, ctx: &mut FactoryContext<'_>) -> Option<Transform> {
    let degrees = config
        .get("rotate")
        .and_then(int_prefix)
        .and_then(|d| i32::try_from(d).ok())
        .filter(|d| *d != 0)?;
    ctx.use_param("rotate");
    let background = options::background(config, ctx);

    Some(transform(move |image, meta| {
        meta.rotate = Some(degrees);
        if let Some(raw) = &background {
            meta.background_directive = Some(raw.clone());
        }
        image.rotate(degrees, background_color(background.as_deref()))
    }))
}

/// `flip`: mirror top to bottom.
pub fn flip(config: &ResolvedConfig, ctx: &mut FactoryContext<'_>) -> Option<Transform> {
    if !use_flag(config, ctx, "flip") {
        return None;
    }
    Some(transform(|image, meta| {
        meta.flip = Some(true);
        image.flip()
    }))
}

/// `flop`: mirror left to right.
pub fn flop(config: &ResolvedConfig, ctx: &mut FactoryContext<'_>) -> Option<Transform> {
    if !use_flag(config, ctx, "flop") {
        return None;
    }
    Some(transform(|image, meta| {
        meta.flop = Some(true);
        image.flop()
    }))
}
