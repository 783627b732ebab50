//! End-to-end requests through the engine with the pure-Rust backend.
//!
//! Sources are small synthetic PNGs; variants are written to a temp directory
//! and decoded again to check what actually came out.

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD as BASE64;
use image::{ImageEncoder, RgbImage};
use image_directives::cache::VariantCache;
use image_directives::config::EngineConfig;
use image_directives::engine::{AssetSink, Delivery, Engine, Response};
use image_directives::imaging::RustBackend;
use image_directives::output::OutputValue;
use std::io;
use std::path::PathBuf;
use std::sync::Mutex;
use tempfile::TempDir;

fn png_bytes(width: u32, height: u32) -> Vec<u8> {
    let img = RgbImage::from_fn(width, height, |x, y| {
        image::Rgb([(x * 2) as u8, (y * 3) as u8, 128])
    });
    let mut buf = Vec::new();
    image::codecs::png::PngEncoder::new(&mut buf)
        .write_image(img.as_raw(), width, height, image::ExtendedColorType::Rgb8)
        .unwrap();
    buf
}

/// Writes each emitted asset as `<n>-<name>` and returns that file name.
struct DirSink {
    dir: PathBuf,
    count: Mutex<usize>,
}

impl DirSink {
    fn new(dir: PathBuf) -> Self {
        Self {
            dir,
            count: Mutex::new(0),
        }
    }

    fn decode(&self, src: &str) -> image::DynamicImage {
        image::open(self.dir.join(src)).unwrap()
    }
}

impl AssetSink for DirSink {
    fn emit(&self, name: &str, bytes: &[u8]) -> io::Result<String> {
        let mut count = self.count.lock().unwrap();
        *count += 1;
        let file_name = format!("{}-{}", *count, name);
        std::fs::write(self.dir.join(&file_name), bytes)?;
        Ok(file_name)
    }
}

struct Fixture {
    _tmp: TempDir,
    engine: Engine<RustBackend>,
    sink: DirSink,
    source: Vec<u8>,
}

fn fixture() -> Fixture {
    let tmp = TempDir::new().unwrap();
    let out = tmp.path().join("out");
    std::fs::create_dir_all(&out).unwrap();
    let cache = VariantCache::new(tmp.path().join("cache"), None);
    Fixture {
        engine: Engine::new(RustBackend::new(), EngineConfig::default(), cache),
        sink: DirSink::new(out),
        source: png_bytes(120, 80),
        _tmp: tmp,
    }
}

impl Fixture {
    fn process(&self, query: &str) -> Response {
        self.engine
            .process(&self.source, "photos/harbour.png", query, Delivery::Emit(&self.sink))
            .unwrap()
            .unwrap()
    }
}

#[test]
fn picture_with_two_formats() {
    let f = fixture();
    let response = f.process("w=60;120&format=webp;jpeg&as=picture");
    assert!(response.failures.is_empty());

    let Some(OutputValue::Picture(picture)) = &response.value else {
        panic!("expected picture, got {:?}", response.value);
    };
    let formats: Vec<&str> = picture.sources.iter().map(|(f, _)| f.as_str()).collect();
    assert_eq!(formats, vec!["webp", "jpeg"]);
    assert_eq!((picture.img.w, picture.img.h), (120, 80));
    assert!(picture.img.src.ends_with("harbour.jpeg"));

    let decoded = f.sink.decode(&picture.img.src);
    assert_eq!((decoded.width(), decoded.height()), (120, 80));

    let small = &response.metadatas[0];
    assert_eq!((small.width, small.height, small.format.as_str()), (60, 40, "webp"));
    let decoded = f.sink.decode(&small.src);
    assert_eq!((decoded.width(), decoded.height()), (60, 40));
}

#[test]
fn widths_beyond_source_are_clamped() {
    let f = fixture();
    let response = f.process("w=100;500;900&format=png");
    let widths: Vec<u32> = response.metadatas.iter().map(|m| m.width).collect();
    assert_eq!(widths, vec![100, 120]);
}

#[test]
fn rotate_swaps_dimensions_and_is_recorded() {
    let f = fixture();
    let response = f.process("rotate=90&format=png&as=metadata:width;height;rotate");
    assert_eq!(
        response.value,
        Some(OutputValue::Json(serde_json::json!({"width": 80, "height": 120, "rotate": 90})))
    );
}

#[test]
fn srcset_with_density_descriptors() {
    let f = fixture();
    let response = f.process("w=60;120&basePixels=60&format=png&as=srcset");
    let Some(OutputValue::Text(srcset)) = &response.value else {
        panic!("expected text");
    };
    let parts: Vec<&str> = srcset.split(", ").collect();
    assert_eq!(parts.len(), 2);
    assert!(parts[0].ends_with(" 1x"));
    assert!(parts[1].ends_with(" 2x"));
}

#[test]
fn inline_variant_decodes() {
    let f = fixture();
    let response = f.process("w=30&format=png&inline");
    let Some(OutputValue::Text(src)) = &response.value else {
        panic!("expected text");
    };
    let payload = src.strip_prefix("data:image/png;base64,").unwrap();
    let bytes = BASE64.decode(payload).unwrap();
    let decoded = image::load_from_memory(&bytes).unwrap();
    assert_eq!((decoded.width(), decoded.height()), (30, 20));
}

#[test]
fn repeated_request_served_from_cache() {
    let f = fixture();
    let query = "w=60&format=jpeg&grayscale&as=img";
    let first = f.process(query);
    let second = f.process(query);

    let stats = f.engine.cache().stats();
    assert_eq!((stats.hits, stats.misses), (1, 1));
    assert_eq!(first.metadatas[0].width, second.metadatas[0].width);
    assert_eq!(second.metadatas[0].format, "jpeg");
    assert_eq!(second.metadatas[0].grayscale, Some(true));
}

#[test]
fn unsupported_encoding_fails_only_that_variant() {
    let f = fixture();
    let response = f.process("format=png;gif");
    assert_eq!(response.metadatas.len(), 1);
    assert_eq!(response.failures.len(), 1);
    assert_eq!(response.failures[0].index, 1);
    assert_eq!(response.failures[0].config.get("format"), Some("gif"));
}

#[test]
fn every_variant_failing_still_reports_failures() {
    let f = fixture();
    let response = f.process("format=gif&as=img");
    assert_eq!(response.value, None);
    assert_eq!(response.failures.len(), 1);
}

#[test]
fn oversized_upscale_fails_only_that_variant() {
    let f = fixture();
    let response = f.process("w=60;200000&allowUpscale&format=png");
    assert_eq!(response.metadatas.len(), 1);
    assert_eq!(response.metadatas[0].width, 60);
    assert_eq!(response.failures.len(), 1);
    assert_eq!(response.failures[0].index, 1);
}
