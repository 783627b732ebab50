//! Image processing capability: backend trait, handle trait and shared types.
//!
//! The engine never touches pixels. It asks an [`ImageBackend`] to decode the
//! source once ([`ImageBackend::open`]), clones the resulting [`ImageHandle`]
//! per variant, and drives the handle through the operations a pipeline
//! needs. On cache hits it only asks the backend to [`identify`] stored bytes.
//!
//! The production implementation is
//! [`RustBackend`](super::rust_backend::RustBackend), built on the `image`
//! crate. Tests use the recording [`tests::MockBackend`].
//!
//! [`identify`]: ImageBackend::identify

use super::params::{Color, FormatOptions, Modulation, ResizeOptions};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum BackendError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Processing failed: {0}")]
    ProcessingFailed(String),
    #[error("Unsupported: {0}")]
    Unsupported(String),
}

/// Dimensions and encoding of an image, as reported by the backend.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IntrinsicMetadata {
    pub width: u32,
    pub height: u32,
    /// Canonical format name (`jpeg`, `png`, `webp`, `avif`, ...).
    pub format: String,
    pub has_alpha: bool,
}

/// Entry point of an image processing backend.
pub trait ImageBackend: Sync {
    /// Decode source bytes into a handle.
    fn open(&self, bytes: &[u8]) -> Result<Box<dyn ImageHandle>, BackendError>;

    /// Read dimensions and format from encoded bytes without running a pipeline.
    fn identify(&self, bytes: &[u8]) -> Result<IntrinsicMetadata, BackendError>;
}

/// A decoded image that transforms mutate in place.
///
/// Operations are recorded or applied immediately depending on the backend;
/// either way [`metadata`](ImageHandle::metadata) reflects every operation
/// applied so far, and [`to_buffer`](ImageHandle::to_buffer) produces the
/// encoded variant.
pub trait ImageHandle: Send + Sync {
    fn metadata(&self) -> IntrinsicMetadata;

    fn resize(&mut self, options: &ResizeOptions) -> Result<(), BackendError>;

    /// Rotate clockwise by `degrees`. Non-right angles expand the canvas and
    /// fill the corners with `background`.
    fn rotate(&mut self, degrees: i32, background: Option<Color>) -> Result<(), BackendError>;

    /// Mirror vertically (top ↔ bottom).
    fn flip(&mut self) -> Result<(), BackendError>;

    /// Mirror horizontally (left ↔ right).
    fn flop(&mut self) -> Result<(), BackendError>;

    /// Gaussian blur; `None` asks for the backend's mild default blur.
    fn blur(&mut self, sigma: Option<f32>) -> Result<(), BackendError>;

    fn median(&mut self, size: u32) -> Result<(), BackendError>;

    fn tint(&mut self, color: Color) -> Result<(), BackendError>;

    fn grayscale(&mut self) -> Result<(), BackendError>;

    fn modulate(&mut self, modulation: &Modulation) -> Result<(), BackendError>;

    fn invert(&mut self) -> Result<(), BackendError>;

    /// Stretch contrast to the full range.
    fn normalize(&mut self) -> Result<(), BackendError>;

    /// Composite over `background` and drop the alpha channel.
    fn flatten(&mut self, background: Option<Color>) -> Result<(), BackendError>;

    fn set_format(&mut self, options: &FormatOptions) -> Result<(), BackendError>;

    /// Whether embedded metadata (ICC, EXIF) survives encoding.
    fn keep_metadata(&mut self, keep: bool);

    fn to_buffer(&self) -> Result<Vec<u8>, BackendError>;

    fn boxed_clone(&self) -> Box<dyn ImageHandle>;
}
