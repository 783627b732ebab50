//! Pure Rust image processing backend.
//!
//! Everything is statically linked into the binary.
//!
//! ## Crate mapping
//!
//! | Operation | Crate / function |
//! |---|---|
//! | Decode (JPEG, PNG, TIFF, WebP) | `image` crate (pure Rust decoders) |
//! | Identify (AVIF) | `avif-parse` (container metadata only) |
//! | Resize | `image::DynamicImage::resize_exact` + crop / pad from [`calculations`](super::calculations) |
//! | Rotate | `rotate90/180/270`, nearest-neighbour for other angles |
//! | Blur | `DynamicImage::blur` (gaussian), `filter3x3` box blur by default |
//! | Hue | `DynamicImage::huerotate` |
//! | Median, tint, normalize, saturation, brightness | per-pixel loops over RGBA8 |
//! | Encode → AVIF | `image::codecs::avif::AvifEncoder` (rav1e, speed 6) |
//! | Encode → JPEG / PNG / WebP / TIFF | `image` codecs (WebP is lossless only) |
//!
//! AVIF sources cannot be decoded: the `image` crate's `"avif"` feature only
//! enables the encoder. HEIF and GIF cannot be encoded. Both surface as
//! [`BackendError::Unsupported`] and fail only the affected variant.

use super::backend::{BackendError, ImageBackend, ImageHandle, IntrinsicMetadata};
use super::calculations::{
    anchor_offset, calculate_fill_dimensions, calculate_fit_dimensions, rotated_bounds,
};
use super::params::{
    Color, Fit, FormatOptions, Kernel, Modulation, ResizeOptions, TargetFormat,
};
use image::imageops::FilterType;
use image::{
    DynamicImage, ImageDecoder, ImageEncoder, ImageFormat, ImageReader, Rgba, RgbaImage,
};
use std::io::Cursor;

/// AVIF encoder speed (1 = slowest/best, 10 = fastest).
const AVIF_SPEED: u8 = 6;

/// Largest canvas a resize or rotate may allocate.
pub const MAX_OUTPUT_PIXELS: u64 = 100_000_000;

fn check_canvas(width: u32, height: u32) -> Result<(), BackendError> {
    let pixels = width as u64 * height as u64;
    if pixels > MAX_OUTPUT_PIXELS {
        return Err(BackendError::Unsupported(format!(
            "{width}x{height} exceeds the {MAX_OUTPUT_PIXELS} pixel limit"
        )));
    }
    Ok(())
}

/// Pure Rust backend using the `image` crate ecosystem.
///
/// See the [module docs](self) for the crate-to-operation mapping.
pub struct RustBackend;

impl RustBackend {
    pub fn new() -> Self {
        Self
    }
}

impl Default for RustBackend {
    fn default() -> Self {
        Self::new()
    }
}

fn processing(context: &str) -> impl Fn(image::ImageError) -> BackendError + '_ {
    move |e| BackendError::ProcessingFailed(format!("{context}: {e}"))
}

fn format_name(format: ImageFormat) -> String {
    match format {
        ImageFormat::Jpeg => "jpeg".to_string(),
        ImageFormat::Png => "png".to_string(),
        ImageFormat::WebP => "webp".to_string(),
        ImageFormat::Tiff => "tiff".to_string(),
        ImageFormat::Avif => "avif".to_string(),
        ImageFormat::Gif => "gif".to_string(),
        other => format!("{other:?}").to_lowercase(),
    }
}

fn guessed_reader(bytes: &[u8]) -> Result<ImageReader<Cursor<&[u8]>>, BackendError> {
    Ok(ImageReader::new(Cursor::new(bytes)).with_guessed_format()?)
}

/// Extract dimensions from an AVIF container (no full decode needed).
fn identify_avif(bytes: &[u8]) -> Result<IntrinsicMetadata, BackendError> {
    let avif = avif_parse::read_avif(&mut Cursor::new(bytes))
        .map_err(|e| BackendError::ProcessingFailed(format!("Failed to parse AVIF: {e:?}")))?;
    let meta = avif.primary_item_metadata().map_err(|e| {
        BackendError::ProcessingFailed(format!("Failed to read AVIF metadata: {e:?}"))
    })?;
    Ok(IntrinsicMetadata {
        width: meta.max_frame_width.get(),
        height: meta.max_frame_height.get(),
        format: "avif".to_string(),
        has_alpha: false,
    })
}

impl ImageBackend for RustBackend {
    fn open(&self, bytes: &[u8]) -> Result<Box<dyn ImageHandle>, BackendError> {
        let reader = guessed_reader(bytes)?;
        let format = reader
            .format()
            .ok_or_else(|| BackendError::Unsupported("unrecognized image data".into()))?;
        if format == ImageFormat::Avif {
            return Err(BackendError::Unsupported(
                "AVIF sources cannot be decoded".into(),
            ));
        }

        let mut decoder = reader.into_decoder().map_err(processing("Failed to decode"))?;
        let icc_profile = decoder.icc_profile().ok().flatten();
        let image = DynamicImage::from_decoder(decoder).map_err(processing("Failed to decode"))?;

        Ok(Box::new(RustImage {
            image,
            source_format: format_name(format),
            icc_profile,
            keep_metadata: true,
            output: None,
        }))
    }

    fn identify(&self, bytes: &[u8]) -> Result<IntrinsicMetadata, BackendError> {
        let reader = guessed_reader(bytes)?;
        let format = reader
            .format()
            .ok_or_else(|| BackendError::Unsupported("unrecognized image data".into()))?;
        if format == ImageFormat::Avif {
            return identify_avif(bytes);
        }

        let decoder = reader
            .into_decoder()
            .map_err(processing("Failed to read dimensions"))?;
        let (width, height) = decoder.dimensions();
        Ok(IntrinsicMetadata {
            width,
            height,
            format: format_name(format),
            has_alpha: decoder.color_type().has_alpha(),
        })
    }
}

/// A decoded image held in memory.
#[derive(Clone)]
pub struct RustImage {
    image: DynamicImage,
    source_format: String,
    icc_profile: Option<Vec<u8>>,
    keep_metadata: bool,
    output: Option<FormatOptions>,
}

fn filter_type(kernel: Kernel) -> FilterType {
    match kernel {
        Kernel::Nearest => FilterType::Nearest,
        Kernel::Cubic | Kernel::Mitchell | Kernel::Lanczos2 => FilterType::CatmullRom,
        Kernel::Lanczos3 => FilterType::Lanczos3,
    }
}

fn rgba(color: Color) -> Rgba<u8> {
    Rgba([color.r, color.g, color.b, color.a])
}

fn luma(p: &Rgba<u8>) -> f32 {
    0.299 * p[0] as f32 + 0.587 * p[1] as f32 + 0.114 * p[2] as f32
}

fn channel(value: f32) -> u8 {
    value.round().clamp(0.0, 255.0) as u8
}

/// Nearest-neighbour rotation by an arbitrary clockwise angle onto an
/// expanded canvas.
fn rotate_arbitrary(image: &DynamicImage, degrees: f64, background: Color) -> DynamicImage {
    let source = image.to_rgba8();
    let (sw, sh) = source.dimensions();
    let (dw, dh) = rotated_bounds(sw, sh, degrees);
    let (sin, cos) = degrees.to_radians().sin_cos();
    let (scx, scy) = (sw as f64 / 2.0, sh as f64 / 2.0);
    let (dcx, dcy) = (dw as f64 / 2.0, dh as f64 / 2.0);
    let fill = rgba(background);

    DynamicImage::ImageRgba8(RgbaImage::from_fn(dw, dh, |x, y| {
        let dx = x as f64 + 0.5 - dcx;
        let dy = y as f64 + 0.5 - dcy;
        let sx = dx * cos + dy * sin + scx;
        let sy = -dx * sin + dy * cos + scy;
        if sx >= 0.0 && sy >= 0.0 && (sx as u32) < sw && (sy as u32) < sh {
            *source.get_pixel(sx as u32, sy as u32)
        } else {
            fill
        }
    }))
}

fn median_filter(image: &DynamicImage, size: u32) -> DynamicImage {
    let source = image.to_rgba8();
    let (w, h) = source.dimensions();
    let radius = (size / 2) as i64;
    let mut window: [Vec<u8>; 4] = Default::default();

    DynamicImage::ImageRgba8(RgbaImage::from_fn(w, h, |x, y| {
        for c in window.iter_mut() {
            c.clear();
        }
        for dy in -radius..=radius {
            for dx in -radius..=radius {
                let sx = (x as i64 + dx).clamp(0, w as i64 - 1) as u32;
                let sy = (y as i64 + dy).clamp(0, h as i64 - 1) as u32;
                let p = source.get_pixel(sx, sy);
                for (c, values) in window.iter_mut().enumerate() {
                    values.push(p[c]);
                }
            }
        }
        let mut out = [0u8; 4];
        for (c, values) in window.iter_mut().enumerate() {
            values.sort_unstable();
            out[c] = values[values.len() / 2];
        }
        Rgba(out)
    }))
}

/// Convert to the 8-bit layout every encoder here accepts.
fn encodable(image: &DynamicImage, keep_alpha: bool) -> DynamicImage {
    if keep_alpha && image.color().has_alpha() {
        DynamicImage::ImageRgba8(image.to_rgba8())
    } else {
        DynamicImage::ImageRgb8(image.to_rgb8())
    }
}

fn attach_icc(encoder: &mut impl ImageEncoder, icc_profile: Option<&Vec<u8>>) {
    if let Some(icc) = icc_profile {
        if let Err(e) = encoder.set_icc_profile(icc.clone()) {
            tracing::debug!("ICC profile dropped: {e}");
        }
    }
}

impl RustImage {
    fn target_format(&self) -> Result<TargetFormat, BackendError> {
        match &self.output {
            Some(options) => Ok(options.format),
            None => TargetFormat::parse(&self.source_format).ok_or_else(|| {
                BackendError::Unsupported(format!("cannot encode {}", self.source_format))
            }),
        }
    }

    fn map_pixels(&mut self, f: impl Fn(&mut Rgba<u8>)) {
        let mut pixels = self.image.to_rgba8();
        pixels.pixels_mut().for_each(f);
        self.image = DynamicImage::ImageRgba8(pixels);
    }
}

impl ImageHandle for RustImage {
    fn metadata(&self) -> IntrinsicMetadata {
        IntrinsicMetadata {
            width: self.image.width(),
            height: self.image.height(),
            format: self
                .output
                .as_ref()
                .map(|o| o.format.name().to_string())
                .unwrap_or_else(|| self.source_format.clone()),
            has_alpha: self.image.color().has_alpha(),
        }
    }

    fn resize(&mut self, options: &ResizeOptions) -> Result<(), BackendError> {
        let filter = filter_type(options.kernel);
        let source = (self.image.width(), self.image.height());
        let target = (options.width.max(1), options.height.max(1));
        let anchor = options.position.anchor();
        check_canvas(target.0, target.1)?;

        self.image = match options.fit {
            Fit::Fill => self.image.resize_exact(target.0, target.1, filter),
            Fit::Inside => {
                let (w, h) = calculate_fit_dimensions(source, target);
                self.image.resize_exact(w, h, filter)
            }
            Fit::Outside => {
                let (w, h) = calculate_fill_dimensions(source, target);
                check_canvas(w, h)?;
                self.image.resize_exact(w, h, filter)
            }
            Fit::Cover => {
                let (w, h) = calculate_fill_dimensions(source, target);
                check_canvas(w, h)?;
                let filled = self.image.resize_exact(w, h, filter);
                let (x, y) = anchor_offset((w, h), target, anchor);
                filled.crop_imm(x, y, target.0, target.1)
            }
            Fit::Contain => {
                let (w, h) = calculate_fit_dimensions(source, target);
                let placed = self.image.resize_exact(w, h, filter).to_rgba8();
                let background = options.background.unwrap_or(Color::BLACK);
                let mut canvas = RgbaImage::from_pixel(target.0, target.1, rgba(background));
                let (x, y) = anchor_offset(target, (w, h), anchor);
                image::imageops::overlay(&mut canvas, &placed, x as i64, y as i64);
                DynamicImage::ImageRgba8(canvas)
            }
        };
        Ok(())
    }

    fn rotate(&mut self, degrees: i32, background: Option<Color>) -> Result<(), BackendError> {
        self.image = match degrees.rem_euclid(360) {
            0 => return Ok(()),
            90 => self.image.rotate90(),
            180 => self.image.rotate180(),
            270 => self.image.rotate270(),
            other => {
                let (w, h) = rotated_bounds(self.image.width(), self.image.height(), other as f64);
                check_canvas(w, h)?;
                rotate_arbitrary(&self.image, other as f64, background.unwrap_or(Color::BLACK))
            }
        };
        Ok(())
    }

    fn flip(&mut self) -> Result<(), BackendError> {
        self.image = self.image.flipv();
        Ok(())
    }

    fn flop(&mut self) -> Result<(), BackendError> {
        self.image = self.image.fliph();
        Ok(())
    }

    fn blur(&mut self, sigma: Option<f32>) -> Result<(), BackendError> {
        self.image = match sigma {
            Some(sigma) => self.image.blur(sigma),
            None => self.image.filter3x3(&[1.0 / 9.0; 9]),
        };
        Ok(())
    }

    fn median(&mut self, size: u32) -> Result<(), BackendError> {
        if size > 1 {
            self.image = median_filter(&self.image, size);
        }
        Ok(())
    }

    fn tint(&mut self, color: Color) -> Result<(), BackendError> {
        self.map_pixels(|p| {
            let l = luma(p) / 255.0;
            p[0] = channel(l * color.r as f32);
            p[1] = channel(l * color.g as f32);
            p[2] = channel(l * color.b as f32);
        });
        Ok(())
    }

    fn grayscale(&mut self) -> Result<(), BackendError> {
        self.image = self.image.grayscale();
        Ok(())
    }

    fn modulate(&mut self, modulation: &Modulation) -> Result<(), BackendError> {
        if let Some(hue) = modulation.hue {
            self.image = self.image.huerotate(hue);
        }
        let saturation = modulation.saturation.unwrap_or(1.0);
        let brightness = modulation.brightness.unwrap_or(1.0);
        if saturation != 1.0 || brightness != 1.0 {
            self.map_pixels(|p| {
                let l = luma(p);
                for c in 0..3 {
                    let saturated = l + (p[c] as f32 - l) * saturation;
                    p[c] = channel(saturated * brightness);
                }
            });
        }
        Ok(())
    }

    fn invert(&mut self) -> Result<(), BackendError> {
        self.image.invert();
        Ok(())
    }

    fn normalize(&mut self) -> Result<(), BackendError> {
        let pixels = self.image.to_rgba8();
        let (min, max) = pixels.pixels().fold((255u8, 0u8), |(lo, hi), p| {
            let l = channel(luma(p));
            (lo.min(l), hi.max(l))
        });
        if max > min {
            let scale = 255.0 / (max - min) as f32;
            self.map_pixels(|p| {
                for c in 0..3 {
                    p[c] = channel((p[c] as f32 - min as f32) * scale);
                }
            });
        }
        Ok(())
    }

    fn flatten(&mut self, background: Option<Color>) -> Result<(), BackendError> {
        if !self.image.color().has_alpha() {
            return Ok(());
        }
        let bg = background.unwrap_or(Color::BLACK);
        let source = self.image.to_rgba8();
        let flat = image::RgbImage::from_fn(source.width(), source.height(), |x, y| {
            let p = source.get_pixel(x, y);
            let alpha = p[3] as f32 / 255.0;
            let blend = |fg: u8, bg: u8| channel(fg as f32 * alpha + bg as f32 * (1.0 - alpha));
            image::Rgb([blend(p[0], bg.r), blend(p[1], bg.g), blend(p[2], bg.b)])
        });
        self.image = DynamicImage::ImageRgb8(flat);
        Ok(())
    }

    fn set_format(&mut self, options: &FormatOptions) -> Result<(), BackendError> {
        if matches!(options.format, TargetFormat::Heif | TargetFormat::Gif) {
            return Err(BackendError::Unsupported(format!(
                "cannot encode {}",
                options.format.name()
            )));
        }
        self.output = Some(options.clone());
        Ok(())
    }

    fn keep_metadata(&mut self, keep: bool) {
        self.keep_metadata = keep;
    }

    fn to_buffer(&self) -> Result<Vec<u8>, BackendError> {
        let format = self.target_format()?;
        let quality = self
            .output
            .as_ref()
            .and_then(|o| o.quality)
            .unwrap_or_default()
            .value() as u8;
        let icc = self.icc_profile.as_ref().filter(|_| self.keep_metadata);
        let mut buf = Vec::new();

        match format {
            TargetFormat::Jpeg => {
                let mut encoder =
                    image::codecs::jpeg::JpegEncoder::new_with_quality(&mut buf, quality);
                attach_icc(&mut encoder, icc);
                encodable(&self.image, false)
                    .write_with_encoder(encoder)
                    .map_err(processing("JPEG encode failed"))?;
            }
            TargetFormat::Png => {
                let mut encoder = image::codecs::png::PngEncoder::new(&mut buf);
                attach_icc(&mut encoder, icc);
                self.image
                    .write_with_encoder(encoder)
                    .map_err(processing("PNG encode failed"))?;
            }
            TargetFormat::WebP => {
                let mut encoder = image::codecs::webp::WebPEncoder::new_lossless(&mut buf);
                attach_icc(&mut encoder, icc);
                encodable(&self.image, true)
                    .write_with_encoder(encoder)
                    .map_err(processing("WebP encode failed"))?;
            }
            TargetFormat::Avif => {
                let encoder = image::codecs::avif::AvifEncoder::new_with_speed_quality(
                    &mut buf,
                    AVIF_SPEED,
                    quality,
                );
                encodable(&self.image, true)
                    .write_with_encoder(encoder)
                    .map_err(processing("AVIF encode failed"))?;
            }
            TargetFormat::Tiff => {
                let encoder = image::codecs::tiff::TiffEncoder::new(Cursor::new(&mut buf));
                encodable(&self.image, true)
                    .write_with_encoder(encoder)
                    .map_err(processing("TIFF encode failed"))?;
            }
            TargetFormat::Heif | TargetFormat::Gif => {
                return Err(BackendError::Unsupported(format!(
                    "cannot encode {}",
                    format.name()
                )));
            }
        }
        Ok(buf)
    }

    fn boxed_clone(&self) -> Box<dyn ImageHandle> {
        Box::new(self.clone())
    }
}
