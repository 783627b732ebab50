//! # Image Directives
//!
//! Turns URL-style directive queries into processed image variants and the
//! value a page needs to reference them.
//!
//! ```text
//! photo.jpg?w=300;600&format=avif;webp&as=picture
//!   → 4 variants (300/avif, 300/webp, 600/avif, 600/webp)
//!   → { sources: { avif: "… 300w, … 600w" }, img: { src, w: 600, h: 400 } }
//! ```
//!
//! # Architecture
//!
//! A request flows through five stages, each a plain function of the
//! previous stage's output:
//!
//! ```text
//! 1. Extract     query string     →  DirectiveSet       (multi-valued)
//! 2. Resolve     DirectiveSet     →  ResolvedConfig[]   (cartesian product)
//! 3. Build       ResolvedConfig   →  Transform[]        (factory registry)
//! 4. Execute     Transform[]      →  bytes + ImageMetadata
//! 5. Synthesize  ImageMetadata[]  →  OutputValue        (url/srcset/img/picture/…)
//! ```
//!
//! [`engine::Engine`] runs the stages for one source, consults the
//! content-addressed [`cache`] between 3 and 4, and delivers each variant
//! (inline data URL, dev-server path, or an emitted asset) before synthesis.
//!
//! # Module Map
//!
//! | Module | Role |
//! |--------|------|
//! | [`directives`] | Query parsing into an ordered, multi-valued `DirectiveSet` |
//! | [`resolve`] | Cartesian expansion into `ResolvedConfig`s, output selector, upscale clamp |
//! | [`transforms`] | Transform factories, shorthand table, pipeline builder |
//! | [`pipeline`] | Applies a pipeline to a decoded image, accumulating metadata |
//! | [`metadata`] | The per-variant `ImageMetadata` record |
//! | [`output`] | Output formats and the `OutputFormats` registry |
//! | [`html`] | Maud rendering of `img` / `picture` descriptors |
//! | [`cache`] | Content-addressed variant cache with a retention sweep |
//! | [`engine`] | Request orchestration, parallel variants, delivery |
//! | [`config`] | `config.toml` loading, validation, and merging |
//! | [`logger`] | Diagnostic channel used by factories and the engine |
//! | [`imaging`] | Image capability traits and the pure-Rust backend |
//! | [`report`] | CLI output formatting |
//!
//! # Design Decisions
//!
//! ## Registries Are Values
//!
//! [`transforms::FactoryRegistry`] and [`output::OutputFormats`] are
//! immutable. Adding a custom transform or output format builds a new
//! registry that is handed to the engine; the built-ins never change.
//! Registry order is pipeline order, so `flatten` always runs before
//! `rotate` and `format` always runs last.
//!
//! ## Explicit Metadata Accumulator
//!
//! Transforms receive the image handle and the variant's
//! [`metadata::ImageMetadata`] side by side and record what they did in the
//! latter. Nothing is stashed on the handle, so the imaging backend stays a
//! plain capability and the cache can store the record as a JSON sidecar.
//!
//! ## Swappable Imaging
//!
//! The engine depends only on [`imaging::ImageBackend`] and
//! [`imaging::ImageHandle`]. [`imaging::RustBackend`] implements them with
//! the `image` crate; tests use a recording mock that never touches pixels.

pub mod cache;
pub mod config;
pub mod directives;
pub mod engine;
pub mod html;
pub mod imaging;
pub mod logger;
pub mod metadata;
pub mod output;
pub mod pipeline;
pub mod report;
pub mod resolve;
pub mod transforms;
