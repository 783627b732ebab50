//! Shared option decisions.
//!
//! Several factories read the same directives (`background` is used by
//! flatten, resize and rotate; `quality` only matters to format). These
//! functions turn one raw directive into a validated value. Their only side
//! effect is marking the directive as used when it is accepted.

use super::{FactoryContext, SHORTHANDS};
use crate::imaging::{Color, Fit, Kernel, Position, Quality};
use crate::resolve::ResolvedConfig;
use crate::transforms::parse::int_prefix;

/// `true` when `key` is present as a keyword or set to `true`.
pub fn flag(config: &ResolvedConfig, key: &str) -> bool {
    matches!(config.get(key), Some("" | "true"))
}

/// Like [`flag`], marking the directive as used when set.
pub fn use_flag(config: &ResolvedConfig, ctx: &mut FactoryContext<'_>, key: &str) -> bool {
    let set = flag(config, key);
    if set {
        ctx.use_param(key);
    }
    set
}

/// Raw `background` directive, if non-empty.
pub fn background(config: &ResolvedConfig, ctx: &mut FactoryContext<'_>) -> Option<String> {
    let value = config.get("background").filter(|v| !v.is_empty())?;
    ctx.use_param("background");
    Some(value.to_string())
}

/// Colour for a raw background directive. Unparseable colours fall back to
/// the backend default.
pub fn background_color(raw: Option<&str>) -> Option<Color> {
    raw.and_then(Color::parse)
}

fn shorthand(
    config: &ResolvedConfig,
    ctx: &mut FactoryContext<'_>,
    directive: &str,
) -> Option<&'static str> {
    for (key, target, value) in SHORTHANDS.iter() {
        if *target == directive && config.get(key) == Some("") {
            ctx.use_param(key);
            return Some(*value);
        }
    }
    None
}

/// Value of `directive`, or of its shorthand when the directive itself is
/// absent or invalid.
fn enum_option<T>(
    config: &ResolvedConfig,
    ctx: &mut FactoryContext<'_>,
    directive: &str,
    parse: impl Fn(&str) -> Option<T>,
) -> Option<T> {
    if let Some(value) = config.get(directive).and_then(&parse) {
        ctx.use_param(directive);
        return Some(value);
    }
    shorthand(config, ctx, directive).and_then(parse)
}

pub fn fit(config: &ResolvedConfig, ctx: &mut FactoryContext<'_>) -> Option<Fit> {
    enum_option(config, ctx, "fit", Fit::parse)
}

pub fn position(config: &ResolvedConfig, ctx: &mut FactoryContext<'_>) -> Option<Position> {
    enum_option(config, ctx, "position", Position::parse)
}

pub fn kernel(config: &ResolvedConfig, ctx: &mut FactoryContext<'_>) -> Option<Kernel> {
    let value = config.get("kernel").and_then(Kernel::parse)?;
    ctx.use_param("kernel");
    Some(value)
}

/// Integer prefix of `quality`, truncated. Zero and non-numeric values are
/// rejected, anything else is clamped to 1–100.
pub fn quality(config: &ResolvedConfig, ctx: &mut FactoryContext<'_>) -> Option<Quality> {
    let value = config
        .get("quality")
        .and_then(int_prefix)
        .filter(|q| *q > 0)?;
    ctx.use_param("quality");
    Some(Quality::new(value.min(100) as u32))
}

pub fn progressive(config: &ResolvedConfig, ctx: &mut FactoryContext<'_>) -> Option<bool> {
    use_flag(config, ctx, "progressive").then_some(true)
}

pub fn lossless(config: &ResolvedConfig, ctx: &mut FactoryContext<'_>) -> Option<bool> {
    use_flag(config, ctx, "lossless").then_some(true)
}
