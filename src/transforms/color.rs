//! Colour factories: `flatten`, `tint`, `grayscale`, `hsb`, `invert`,
//! `normalize`.

use super::options::{self, background_color, use_flag};
use super::parse::{float_prefix, int_prefix};
use super::{FactoryContext, Transform, transform};
use crate::imaging::{Color, Modulation};
use crate::resolve::ResolvedConfig;

/// `flatten`: composite over `background` and drop the alpha channel.
pub fn flatten(config: &ResolvedConfig, ctx: &mut FactoryContext<'_>) -> Option<Transform> {
    if !use_flag(config, ctx, "flatten") {
        return None;
    }
    let background = options::background(config, ctx);

    Some(transform(move |image, meta| {
        meta.flatten = Some(true);
        if let Some(raw) = &background {
            meta.background_directive = Some(raw.clone());
        }
        image.flatten(background_color(background.as_deref()))
    }))
}

pub fn tint(config: &ResolvedConfig, ctx: &mut FactoryContext<'_>) -> Option<Transform> {
    let color = config.get("tint").and_then(Color::parse)?;
    ctx.use_param("tint");

    Some(transform(move |image, meta| {
        meta.tint = Some(color.to_string());
        image.tint(color)
    }))
}

pub fn grayscale(config: &ResolvedConfig, ctx: &mut FactoryContext<'_>) -> Option<Transform> {
    if !use_flag(config, ctx, "grayscale") {
        return None;
    }
    Some(transform(|image, meta| {
        meta.grayscale = Some(true);
        image.grayscale()
    }))
}

/// `hue` (degrees), `saturation` and `brightness` (multipliers, >= 0).
/// Declines when none of the three is valid.
pub fn hsb(config: &ResolvedConfig, ctx: &mut FactoryContext<'_>) -> Option<Transform> {
    let hue = config
        .get("hue")
        .and_then(int_prefix)
        .and_then(|h| i32::try_from(h).ok());
    let multiplier = |key: &str| {
        config
            .get(key)
            .and_then(float_prefix)
            .filter(|v| *v >= 0.0 && v.is_finite())
            .map(|v| v as f32)
    };
    let saturation = multiplier("saturation");
    let brightness = multiplier("brightness");

    if hue.is_none() && saturation.is_none() && brightness.is_none() {
        return None;
    }
    for (key, valid) in [
        ("hue", hue.is_some()),
        ("saturation", saturation.is_some()),
        ("brightness", brightness.is_some()),
    ] {
        if valid {
            ctx.use_param(key);
        }
    }

    let modulation = Modulation {
        hue,
        saturation,
        brightness,
    };
    Some(transform(move |image, meta| {
        meta.hue = modulation.hue;
        meta.saturation = modulation.saturation;
        meta.brightness = modulation.brightness;
        image.modulate(&modulation)
    }))
}

pub fn invert(config: &ResolvedConfig, ctx: &mut FactoryContext<'_>) -> Option<Transform> {
    if !use_flag(config, ctx, "invert") {
        return None;
    }
    Some(transform(|image, meta| {
        meta.invert = Some(true);
        image.invert()
    }))
}

pub fn normalize(config: &ResolvedConfig, ctx: &mut FactoryContext<'_>) -> Option<Transform> {
    if !use_flag(config, ctx, "normalize") {
        return None;
    }
    Some(transform(|image, meta| {
        meta.normalize = Some(true);
        image.normalize()
    }))
}
