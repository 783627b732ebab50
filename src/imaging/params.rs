//! Parameter types for image operations.
//!
//! These types describe *what* to do, not *how* to do it. They are the
//! interface between the directive layer ([`transforms`](crate::transforms),
//! which decides what a variant needs) and the [`backend`](super::backend)
//! (which does the actual pixel work). Directive strings are validated into
//! these types before a backend ever sees them.
//!
//! ## Types
//!
//! - [`Quality`]: Lossy encoding quality (1–100). Clamped on construction.
//! - [`Fit`], [`Position`], [`Kernel`]: resize behaviour enums.
//! - [`Color`]: RGBA colour parsed from hex or a small set of CSS names.
//! - [`ResizeOptions`]: everything a resize needs.
//! - [`TargetFormat`] / [`FormatOptions`]: output encoding selection.

use std::fmt;

/// Quality setting for lossy image encoding (1-100).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Quality(pub u32);

impl Quality {
    pub fn new(value: u32) -> Self {
        Self(value.clamp(1, 100))
    }

    pub fn value(self) -> u32 {
        self.0
    }
}

impl Default for Quality {
    fn default() -> Self {
        Self(80)
    }
}

/// How the image should fit the requested box.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Fit {
    /// Crop to cover both dimensions.
    #[default]
    Cover,
    /// Letterbox inside both dimensions, padding with the background.
    Contain,
    /// Ignore the aspect ratio and stretch.
    Fill,
    /// Largest size that fits inside both dimensions.
    Inside,
    /// Smallest size that covers both dimensions, no crop.
    Outside,
}

impl Fit {
    pub const ALL: [&'static str; 5] = ["cover", "contain", "fill", "inside", "outside"];

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "cover" => Some(Self::Cover),
            "contain" => Some(Self::Contain),
            "fill" => Some(Self::Fill),
            "inside" => Some(Self::Inside),
            "outside" => Some(Self::Outside),
            _ => None,
        }
    }
}

/// Anchor used when cropping (`cover`) or padding (`contain`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Position {
    #[default]
    Center,
    Top,
    RightTop,
    Right,
    RightBottom,
    Bottom,
    LeftBottom,
    Left,
    LeftTop,
    /// Content-aware strategies. Backends without saliency detection
    /// treat these as [`Position::Center`].
    Entropy,
    Attention,
}

impl Position {
    pub const ALL: [&'static str; 20] = [
        "top",
        "right top",
        "right",
        "right bottom",
        "bottom",
        "left bottom",
        "left",
        "left top",
        "north",
        "northeast",
        "east",
        "southeast",
        "south",
        "southwest",
        "west",
        "northwest",
        "center",
        "centre",
        "entropy",
        "attention",
    ];

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "top" | "north" => Some(Self::Top),
            "right top" | "northeast" => Some(Self::RightTop),
            "right" | "east" => Some(Self::Right),
            "right bottom" | "southeast" => Some(Self::RightBottom),
            "bottom" | "south" => Some(Self::Bottom),
            "left bottom" | "southwest" => Some(Self::LeftBottom),
            "left" | "west" => Some(Self::Left),
            "left top" | "northwest" => Some(Self::LeftTop),
            "center" | "centre" => Some(Self::Center),
            "entropy" => Some(Self::Entropy),
            "attention" => Some(Self::Attention),
            _ => None,
        }
    }

    /// Horizontal and vertical anchor as fractions in `[0, 1]`.
    pub fn anchor(self) -> (f64, f64) {
        match self {
            Self::Top => (0.5, 0.0),
            Self::RightTop => (1.0, 0.0),
            Self::Right => (1.0, 0.5),
            Self::RightBottom => (1.0, 1.0),
            Self::Bottom => (0.5, 1.0),
            Self::LeftBottom => (0.0, 1.0),
            Self::Left => (0.0, 0.5),
            Self::LeftTop => (0.0, 0.0),
            Self::Center | Self::Entropy | Self::Attention => (0.5, 0.5),
        }
    }
}

/// Resampling kernel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Kernel {
    Nearest,
    Cubic,
    Mitchell,
    Lanczos2,
    #[default]
    Lanczos3,
}

impl Kernel {
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "nearest" => Some(Self::Nearest),
            "cubic" => Some(Self::Cubic),
            "mitchell" => Some(Self::Mitchell),
            "lanczos2" => Some(Self::Lanczos2),
            "lanczos3" => Some(Self::Lanczos3),
            _ => None,
        }
    }
}

/// An RGBA colour.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Color {
    pub r: u8,
    pub g: u8,
    pub b: u8,
    pub a: u8,
}

impl Color {
    pub const BLACK: Color = Color::rgb(0, 0, 0);

    pub const fn rgb(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b, a: 255 }
    }

    /// Parse `#rgb`, `#rgba`, `#rrggbb`, `#rrggbbaa` (the `#` is optional)
    /// or one of a handful of CSS colour names.
    pub fn parse(value: &str) -> Option<Self> {
        let value = value.trim();
        match value.to_ascii_lowercase().as_str() {
            "black" => return Some(Self::rgb(0, 0, 0)),
            "white" => return Some(Self::rgb(255, 255, 255)),
            "red" => return Some(Self::rgb(255, 0, 0)),
            "green" => return Some(Self::rgb(0, 128, 0)),
            "lime" => return Some(Self::rgb(0, 255, 0)),
            "blue" => return Some(Self::rgb(0, 0, 255)),
            "gray" | "grey" => return Some(Self::rgb(128, 128, 128)),
            "transparent" => return Some(Self { r: 0, g: 0, b: 0, a: 0 }),
            _ => {}
        }

        let hex = value.strip_prefix('#').unwrap_or(value);
        if !hex.chars().all(|c| c.is_ascii_hexdigit()) {
            return None;
        }
        let nibble = |i: usize| u8::from_str_radix(&hex[i..i + 1], 16).ok().map(|n| n * 17);
        let byte = |i: usize| u8::from_str_radix(&hex[i..i + 2], 16).ok();

        match hex.len() {
            3 => Some(Self::rgb(nibble(0)?, nibble(1)?, nibble(2)?)),
            4 => Some(Self {
                r: nibble(0)?,
                g: nibble(1)?,
                b: nibble(2)?,
                a: nibble(3)?,
            }),
            6 => Some(Self::rgb(byte(0)?, byte(2)?, byte(4)?)),
            8 => Some(Self {
                r: byte(0)?,
                g: byte(2)?,
                b: byte(4)?,
                a: byte(6)?,
            }),
            _ => None,
        }
    }
}

impl fmt::Display for Color {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{:02x}{:02x}{:02x}", self.r, self.g, self.b)?;
        if self.a != 255 {
            write!(f, "{:02x}", self.a)?;
        }
        Ok(())
    }
}

/// Parameters for a resize operation.
#[derive(Debug, Clone, PartialEq)]
pub struct ResizeOptions {
    pub width: u32,
    pub height: u32,
    pub fit: Fit,
    pub position: Position,
    pub kernel: Kernel,
    /// Fill colour for `contain` letterboxing. Backends default to opaque black.
    pub background: Option<Color>,
}

/// Encodings a variant can be converted to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TargetFormat {
    Avif,
    Jpeg,
    Png,
    Heif,
    WebP,
    Tiff,
    Gif,
}

impl TargetFormat {
    pub const ALL: [&'static str; 9] = [
        "avif", "jpg", "jpeg", "png", "heif", "heic", "webp", "tiff", "gif",
    ];

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "avif" => Some(Self::Avif),
            "jpg" | "jpeg" => Some(Self::Jpeg),
            "png" => Some(Self::Png),
            "heif" | "heic" => Some(Self::Heif),
            "webp" => Some(Self::WebP),
            "tiff" => Some(Self::Tiff),
            "gif" => Some(Self::Gif),
            _ => None,
        }
    }

    /// Canonical name, as reported in variant metadata and MIME types.
    pub fn name(self) -> &'static str {
        match self {
            Self::Avif => "avif",
            Self::Jpeg => "jpeg",
            Self::Png => "png",
            Self::Heif => "heif",
            Self::WebP => "webp",
            Self::Tiff => "tiff",
            Self::Gif => "gif",
        }
    }
}

/// Parameters for converting a variant to another encoding.
#[derive(Debug, Clone, PartialEq)]
pub struct FormatOptions {
    pub format: TargetFormat,
    pub quality: Option<Quality>,
    pub progressive: bool,
    pub lossless: bool,
}

impl Default for FormatOptions {
    fn default() -> Self {
        Self {
            format: TargetFormat::Jpeg,
            quality: None,
            progressive: false,
            lossless: false,
        }
    }
}

/// Hue / saturation / brightness modulation.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Modulation {
    /// Hue rotation in degrees.
    pub hue: Option<i32>,
    /// Saturation multiplier (1.0 = unchanged).
    pub saturation: Option<f32>,
    /// Brightness multiplier (1.0 = unchanged).
    pub brightness: Option<f32>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn quality_clamps_to_valid_range() {
        assert_eq!(Quality::new(0).value(), 1);
        assert_eq!(Quality::new(50).value(), 50);
        assert_eq!(Quality::new(150).value(), 100);
    }

    #[test]
    fn fit_parses_every_listed_value() {
        for name in Fit::ALL {
            assert!(Fit::parse(name).is_some(), "{name} should parse");
        }
        assert_eq!(Fit::parse("stretch"), None);
    }

    #[test]
    fn position_aliases_share_anchor() {
        assert_eq!(Position::parse("north"), Position::parse("top"));
        assert_eq!(Position::parse("centre"), Some(Position::Center));
        assert_eq!(Position::parse("right top").unwrap().anchor(), (1.0, 0.0));
        for name in Position::ALL {
            assert!(Position::parse(name).is_some(), "{name} should parse");
        }
    }

    #[test]
    fn color_parses_short_and_long_hex() {
        assert_eq!(Color::parse("fff"), Some(Color::rgb(255, 255, 255)));
        assert_eq!(Color::parse("#0f0"), Some(Color::rgb(0, 255, 0)));
        assert_eq!(Color::parse("#336699"), Some(Color::rgb(0x33, 0x66, 0x99)));
        assert_eq!(
            Color::parse("#33669980"),
            Some(Color {
                r: 0x33,
                g: 0x66,
                b: 0x99,
                a: 0x80
            })
        );
    }

    #[test]
    fn color_parses_names_and_rejects_garbage() {
        assert_eq!(Color::parse("White"), Some(Color::rgb(255, 255, 255)));
        assert_eq!(Color::parse("transparent").unwrap().a, 0);
        assert_eq!(Color::parse("#12"), None);
        assert_eq!(Color::parse("zzz"), None);
        assert_eq!(Color::parse(""), None);
    }

    #[test]
    fn color_display_roundtrips() {
        let c = Color::parse("#0a0b0c").unwrap();
        assert_eq!(c.to_string(), "#0a0b0c");
        assert_eq!(Color::parse(&c.to_string()), Some(c));
    }

    #[test]
    fn target_format_aliases() {
        assert_eq!(TargetFormat::parse("jpg"), Some(TargetFormat::Jpeg));
        assert_eq!(TargetFormat::parse("heic"), Some(TargetFormat::Heif));
        assert_eq!(TargetFormat::parse("jpg").unwrap().name(), "jpeg");
        assert_eq!(TargetFormat::parse("bmp"), None);
    }
}
