//! Request orchestration: one source image plus one directive query in, one
//! output value out.
//!
//! ## Flow
//!
//! ```text
//! query ─▶ DirectiveSet ─▶ merge defaults ─▶ clamp w/h ─▶ resolve_configs
//!                                                            │
//!          ┌───────────────── per variant (rayon) ◀──────────┘
//!          │ cache lookup ──hit──▶ bytes + metadata
//!          │     │ miss
//!          │     ▼
//!          │ build_pipeline ─▶ apply_transforms ─▶ encode ─▶ cache store
//!          └──────────────────────────────┬───────────────────────────
//!                                         ▼
//!                           deliver (inline / serve / emit) ─▶ src
//!                                         ▼
//!                                 OutputFormats::synthesize
//! ```
//!
//! The source is decoded at most once, on the first cache miss, and every
//! variant works on its own clone of the handle. A request answered entirely
//! from the cache never decodes. The `w`/`h` clamp only needs the intrinsic
//! size, which comes from [`ImageBackend::identify`]. Variants are processed
//! in parallel but collected in resolution order, so outputs never depend on
//! scheduling.
//!
//! ## Delivery
//!
//! | Mode | `src` |
//! |---|---|
//! | `inline` directive | `data:image/<format>;base64,…` |
//! | [`Delivery::Serve`] | `<origin><base_path>/<cache key>`, answered by [`Engine::served`] |
//! | [`Delivery::Emit`] | Whatever the [`AssetSink`] returns for `<stem>.<format>` |
//!
//! ## Failures
//!
//! A backend error in one variant is reported as a [`VariantFailure`] and the
//! output is synthesized from the variants that succeeded. When none did,
//! [`Response::value`] is `None` and the failures carry the details. Storage
//! errors and an undecodable source fail the whole request.

use crate::cache::{VariantCache, cache_key, hash_bytes};
use crate::config::EngineConfig;
use crate::directives::DirectiveSet;
use crate::imaging::{BackendError, ImageBackend, ImageHandle};
use crate::logger::{Logger, TracingLogger};
use crate::metadata::ImageMetadata;
use crate::output::{OutputError, OutputFormats, OutputValue};
use crate::pipeline::apply_transforms;
use crate::resolve::{ResolvedConfig, clamp_to_intrinsic, resolve_configs};
use crate::transforms::{FactoryRegistry, build_pipeline};
use base64::Engine as _;
use base64::engine::general_purpose::STANDARD as BASE64;
use rayon::prelude::*;
use std::collections::HashMap;
use std::io;
use std::path::Path;
use std::sync::{Arc, Mutex, OnceLock};
use thiserror::Error;
use tracing::debug;

/// Directive that delivers variants as data URLs.
pub const INLINE_KEY: &str = "inline";

#[derive(Error, Debug)]
pub enum EngineError {
    #[error("IO error: {0}")]
    Io(#[from] io::Error),
    #[error("Could not decode source image: {0}")]
    Decode(#[source] BackendError),
    #[error("Output synthesis failed: {0}")]
    Output(#[from] OutputError),
}

/// Receives encoded variants in build mode.
pub trait AssetSink {
    /// Store `bytes` under a name derived from `name` and return the `src`
    /// that refers to it.
    fn emit(&self, name: &str, bytes: &[u8]) -> io::Result<String>;
}

/// How processed variants reach the consumer.
#[derive(Clone, Copy)]
pub enum Delivery<'a> {
    /// Build mode: hand each variant to a sink.
    Emit(&'a dyn AssetSink),
    /// Dev mode: address each variant by id under the base path.
    Serve { origin: &'a str },
}

/// A variant whose pipeline or encoder failed.
#[derive(Debug)]
pub struct VariantFailure {
    /// Position in resolution order.
    pub index: usize,
    pub config: ResolvedConfig,
    pub error: BackendError,
}

#[derive(Debug)]
pub struct Response {
    /// The synthesized output. `None` when every variant failed.
    pub value: Option<OutputValue>,
    /// Metadata of the successful variants, in resolution order.
    pub metadatas: Vec<ImageMetadata>,
    pub failures: Vec<VariantFailure>,
}

/// A variant as a dev server sees it.
#[derive(Debug, Clone)]
struct Generated {
    format: String,
    /// Kept only when the cache cannot supply the bytes.
    bytes: Option<Arc<Vec<u8>>>,
}

/// The source bytes, decoded on first use and shared by every variant.
struct SourceImage<'a, B> {
    backend: &'a B,
    bytes: &'a [u8],
    decoded: OnceLock<Box<dyn ImageHandle>>,
    opening: Mutex<()>,
}

impl<'a, B: ImageBackend> SourceImage<'a, B> {
    fn new(backend: &'a B, bytes: &'a [u8]) -> Self {
        Self {
            backend,
            bytes,
            decoded: OnceLock::new(),
            opening: Mutex::new(()),
        }
    }

    /// A fresh clone of the decoded source.
    fn handle(&self) -> Result<Box<dyn ImageHandle>, EngineError> {
        if let Some(image) = self.decoded.get() {
            return Ok(image.boxed_clone());
        }
        let _opening = self.opening.lock().unwrap_or_else(|e| e.into_inner());
        if let Some(image) = self.decoded.get() {
            return Ok(image.boxed_clone());
        }
        let image = self.backend.open(self.bytes).map_err(EngineError::Decode)?;
        Ok(self.decoded.get_or_init(|| image).boxed_clone())
    }
}

struct Produced {
    key: String,
    bytes: Vec<u8>,
    metadata: ImageMetadata,
}

pub struct Engine<B: ImageBackend> {
    backend: B,
    config: EngineConfig,
    factories: FactoryRegistry,
    formats: OutputFormats,
    cache: VariantCache,
    logger: Arc<dyn Logger>,
    generated: Mutex<HashMap<String, Generated>>,
}

impl<B: ImageBackend> Engine<B> {
    pub fn new(backend: B, config: EngineConfig, cache: VariantCache) -> Self {
        Self {
            backend,
            config,
            factories: FactoryRegistry::builtins(),
            formats: OutputFormats::builtins(),
            cache,
            logger: Arc::new(TracingLogger),
            generated: Mutex::new(HashMap::new()),
        }
    }

    pub fn with_factories(mut self, factories: FactoryRegistry) -> Self {
        self.factories = factories;
        self
    }

    pub fn with_output_formats(mut self, formats: OutputFormats) -> Self {
        self.formats = formats;
        self
    }

    pub fn with_logger(mut self, logger: Arc<dyn Logger>) -> Self {
        self.logger = logger;
        self
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn cache(&self) -> &VariantCache {
        &self.cache
    }

    /// Process `source` (named `name`, e.g. `photos/harbour.jpg`) under
    /// `query`.
    ///
    /// Returns `None` when neither the query nor the default directives ask
    /// for anything, in which case the source should be used as is.
    pub fn process(
        &self,
        source: &[u8],
        name: &str,
        query: &str,
        delivery: Delivery<'_>,
    ) -> Result<Option<Response>, EngineError> {
        let mut directives =
            DirectiveSet::parse_query(query).merge_defaults(&self.config.default_directives());
        if directives.is_empty() {
            return Ok(None);
        }

        if directives.contains("w") || directives.contains("h") {
            let intrinsic = self.backend.identify(source).map_err(EngineError::Decode)?;
            clamp_to_intrinsic(&mut directives, intrinsic.width, intrinsic.height);
        }

        let resolution = resolve_configs(&directives, &self.formats);
        let source_hash = hash_bytes(source);
        debug!(
            "{name}: {} variant(s) for `{directives}`",
            resolution.configs.len()
        );

        let image = SourceImage::new(&self.backend, source);
        let results = resolution
            .configs
            .par_iter()
            .map(|config| self.produce(&image, config, &directives, &source_hash))
            .collect::<Result<Vec<_>, EngineError>>()?;

        let inline = directives.contains(INLINE_KEY);
        let mut metadatas = Vec::with_capacity(results.len());
        let mut failures = Vec::new();
        for (index, (config, result)) in resolution.configs.into_iter().zip(results).enumerate() {
            match result {
                Ok(produced) => {
                    metadatas.push(self.deliver(produced, name, inline, delivery)?);
                }
                Err(error) => {
                    self.logger
                        .error(&format!("{name}: variant `{config}` failed: {error}"));
                    failures.push(VariantFailure {
                        index,
                        config,
                        error,
                    });
                }
            }
        }

        let value = if metadatas.is_empty() && !failures.is_empty() {
            None
        } else {
            Some(self.formats.synthesize(resolution.output.as_ref(), &metadatas)?)
        };
        Ok(Some(Response {
            value,
            metadatas,
            failures,
        }))
    }

    /// Bytes for one variant: from the cache, or by running its pipeline.
    /// The inner `Err` is a failure of this variant only.
    fn produce(
        &self,
        image: &SourceImage<'_, B>,
        config: &ResolvedConfig,
        directives: &DirectiveSet,
        source_hash: &str,
    ) -> Result<Result<Produced, BackendError>, EngineError> {
        let key = cache_key(config, source_hash);
        if let Some(hit) = self.cache.lookup(&key, config, &self.backend)? {
            debug!("cache hit {key}");
            return Ok(Ok(Produced {
                key,
                bytes: hit.bytes,
                metadata: hit.metadata,
            }));
        }

        let pipeline = build_pipeline(config, &self.factories, directives, self.logger.as_ref());
        let encoded = apply_transforms(
            &pipeline.transforms,
            image.handle()?,
            self.config.remove_metadata,
        )
        .and_then(|(handle, metadata)| Ok((handle.to_buffer()?, metadata)));
        let (bytes, metadata) = match encoded {
            Ok(encoded) => encoded,
            Err(e) => return Ok(Err(e)),
        };

        self.cache.store(&key, &bytes, &metadata)?;
        Ok(Ok(Produced {
            key,
            bytes,
            metadata,
        }))
    }

    fn deliver(
        &self,
        produced: Produced,
        name: &str,
        inline: bool,
        delivery: Delivery<'_>,
    ) -> Result<ImageMetadata, EngineError> {
        let Produced {
            key,
            bytes,
            mut metadata,
        } = produced;

        metadata.src = if inline {
            format!(
                "data:image/{};base64,{}",
                metadata.format,
                BASE64.encode(&bytes)
            )
        } else {
            match delivery {
                Delivery::Serve { origin } => {
                    format!("{origin}{}", self.config.served_path(&key))
                }
                Delivery::Emit(sink) => {
                    let stem = Path::new(name)
                        .file_stem()
                        .map(|s| s.to_string_lossy().into_owned())
                        .unwrap_or_else(|| key.clone());
                    sink.emit(&format!("{stem}.{}", metadata.format), &bytes)?
                }
            }
        };

        let generated = Generated {
            format: metadata.format.clone(),
            bytes: (!self.cache.is_enabled()).then(|| Arc::new(bytes)),
        };
        self.generated
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .insert(key, generated);
        Ok(metadata)
    }

    /// Bytes and content type of a variant this engine generated, by id.
    pub fn served(&self, id: &str) -> Result<Option<(Vec<u8>, String)>, EngineError> {
        let generated = self
            .generated
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .get(id)
            .cloned();
        let Some(generated) = generated else {
            return Ok(None);
        };
        let content_type = format!("image/{}", generated.format);
        let bytes = match generated.bytes {
            Some(bytes) => Some(bytes.as_ref().clone()),
            None => self.cache.read(id)?,
        };
        Ok(bytes.map(|b| (b, content_type)))
    }

    /// Finish a build: sweep stale cache entries not used by this engine.
    pub fn end_build(&self) -> Result<usize, EngineError> {
        let removed = self.cache.sweep()?;
        if removed > 0 {
            debug!("swept {removed} stale cache entries");
        }
        Ok(removed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::imaging::backend::tests::{MockBackend, RecordedOp};
    use crate::logger::{Level, RecordingLogger};
    use crate::output::Img;
    use crate::transforms::{TransformFactory, transform};
    use std::cell::RefCell;
    use tempfile::TempDir;

    /// Sink that records emitted names and returns `/assets/<name>`.
    #[derive(Default)]
    struct RecordingSink {
        emitted: RefCell<Vec<(String, Vec<u8>)>>,
    }

    impl AssetSink for RecordingSink {
        fn emit(&self, name: &str, bytes: &[u8]) -> io::Result<String> {
            self.emitted
                .borrow_mut()
                .push((name.to_string(), bytes.to_vec()));
            Ok(format!("/assets/{name}"))
        }
    }

    fn engine(backend: MockBackend) -> Engine<MockBackend> {
        Engine::new(backend, EngineConfig::default(), VariantCache::disabled())
    }

    fn serve() -> Delivery<'static> {
        Delivery::Serve { origin: "" }
    }

    // =========================================================================
    // Requests
    // =========================================================================

    #[test]
    fn empty_query_is_not_processed() {
        let backend = MockBackend::new(100, 100, "jpeg");
        let engine = engine(backend);
        assert!(engine.process(b"src", "a.jpg", "", serve()).unwrap().is_none());
        assert!(engine.backend.get_operations().is_empty());
    }

    #[test]
    fn default_directives_apply_without_query() {
        let config = EngineConfig {
            default_directives: "format=webp".into(),
            ..Default::default()
        };
        let engine = Engine::new(
            MockBackend::new(100, 80, "jpeg"),
            config,
            VariantCache::disabled(),
        );
        let response = engine.process(b"src", "a.jpg", "", serve()).unwrap().unwrap();
        assert_eq!(response.metadatas[0].format, "webp");
    }

    #[test]
    fn request_overrides_default_directives() {
        let config = EngineConfig {
            default_directives: "format=webp".into(),
            ..Default::default()
        };
        let engine = Engine::new(
            MockBackend::new(100, 80, "jpeg"),
            config,
            VariantCache::disabled(),
        );
        let response = engine
            .process(b"src", "a.jpg", "format=png", serve())
            .unwrap()
            .unwrap();
        assert_eq!(response.metadatas[0].format, "png");
    }

    #[test]
    fn variants_in_resolution_order() {
        let engine = engine(MockBackend::new(1000, 500, "jpeg"));
        let response = engine
            .process(b"src", "a.jpg", "w=300;600&format=webp;png&as=metadata:width;format", serve())
            .unwrap()
            .unwrap();
        let summary: Vec<(u32, &str)> = response
            .metadatas
            .iter()
            .map(|m| (m.width, m.format.as_str()))
            .collect();
        assert_eq!(
            summary,
            vec![(300, "webp"), (300, "png"), (600, "webp"), (600, "png")]
        );
    }

    #[test]
    fn widths_clamped_to_source() {
        let engine = engine(MockBackend::new(400, 200, "jpeg"));
        let response = engine
            .process(b"src", "a.jpg", "w=300;800;1200", serve())
            .unwrap()
            .unwrap();
        let widths: Vec<u32> = response.metadatas.iter().map(|m| m.width).collect();
        assert_eq!(widths, vec![300, 400]);
    }

    #[test]
    fn allow_upscale_skips_clamp() {
        let engine = engine(MockBackend::new(400, 200, "jpeg"));
        let response = engine
            .process(b"src", "a.jpg", "w=800&allowUpscale", serve())
            .unwrap()
            .unwrap();
        assert_eq!(response.metadatas[0].width, 800);
    }

    #[test]
    fn undecodable_source_fails_request() {
        let engine = engine(MockBackend::new(1, 1, "png").failing_on("open"));
        let result = engine.process(b"src", "a.png", "w=1", serve());
        assert!(matches!(result, Err(EngineError::Decode(_))));
    }

    // =========================================================================
    // Failures
    // =========================================================================

    #[test]
    fn failing_variant_reported_others_kept() {
        let failing = TransformFactory::new("explode", |config, ctx| {
            if config.get("w") != Some("600") {
                return None;
            }
            ctx.use_param("w");
            Some(transform(|_, _| {
                Err(BackendError::ProcessingFailed("boom".into()))
            }))
        });
        let logger = Arc::new(RecordingLogger::new());
        let engine = engine(MockBackend::new(1000, 500, "jpeg"))
            .with_factories(FactoryRegistry::builtins().with(failing))
            .with_logger(logger.clone());

        let response = engine
            .process(b"src", "a.jpg", "w=300;600;900", serve())
            .unwrap()
            .unwrap();
        assert_eq!(response.metadatas.len(), 2);
        assert_eq!(response.failures.len(), 1);
        assert_eq!(response.failures[0].index, 1);
        assert_eq!(response.failures[0].config.get("w"), Some("600"));
        assert_eq!(logger.at(Level::Error).len(), 1);
        assert_eq!(
            response.value,
            Some(OutputValue::List(vec![
                response.metadatas[0].src.clone(),
                response.metadatas[1].src.clone()
            ]))
        );
    }

    #[test]
    fn all_variants_failing_keeps_failures() {
        let logger = Arc::new(RecordingLogger::new());
        let engine = engine(MockBackend::new(100, 100, "jpeg").failing_on("rotate"))
            .with_logger(logger.clone());
        let response = engine
            .process(b"src", "a.jpg", "rotate=90&as=img", serve())
            .unwrap()
            .unwrap();
        assert_eq!(response.value, None);
        assert!(response.metadatas.is_empty());
        assert_eq!(response.failures.len(), 1);
        assert!(matches!(
            response.failures[0].error,
            BackendError::ProcessingFailed(_)
        ));
        assert_eq!(logger.at(Level::Error).len(), 1);
    }

    #[test]
    fn unused_directive_warns_once_per_variant() {
        let logger = Arc::new(RecordingLogger::new());
        let engine = engine(MockBackend::new(10, 10, "png")).with_logger(logger.clone());
        engine
            .process(b"src", "a.png", "flip&sparkle=yes", serve())
            .unwrap();
        let warnings = logger.at(Level::Warn);
        assert_eq!(warnings.len(), 1);
        assert!(warnings[0].contains("sparkle"));
    }

    // =========================================================================
    // Delivery
    // =========================================================================

    #[test]
    fn serve_uses_origin_base_path_and_key() {
        let engine = engine(MockBackend::new(100, 100, "jpeg"));
        let response = engine
            .process(
                b"src",
                "a.jpg",
                "format=webp",
                Delivery::Serve {
                    origin: "http://localhost:5173",
                },
            )
            .unwrap()
            .unwrap();
        let src = &response.metadatas[0].src;
        let id = src
            .strip_prefix("http://localhost:5173/@imagetools/")
            .unwrap();
        assert_eq!(id.len(), 64);

        let (bytes, content_type) = engine.served(id).unwrap().unwrap();
        assert_eq!(bytes, b"mock:100x100:webp");
        assert_eq!(content_type, "image/webp");
        assert!(engine.served("unknown").unwrap().is_none());
    }

    #[test]
    fn inline_produces_data_url() {
        let engine = engine(MockBackend::new(2, 2, "png"));
        let response = engine
            .process(b"src", "a.png", "format=png&inline", serve())
            .unwrap()
            .unwrap();
        assert_eq!(
            response.value,
            Some(OutputValue::Text(format!(
                "data:image/png;base64,{}",
                BASE64.encode("mock:2x2:png")
            )))
        );
    }

    #[test]
    fn emit_names_by_stem_and_format() {
        let sink = RecordingSink::default();
        let engine = engine(MockBackend::new(640, 480, "jpeg"));
        let response = engine
            .process(
                b"src",
                "photos/harbour.jpg",
                "w=320;640&format=webp&as=img",
                Delivery::Emit(&sink),
            )
            .unwrap()
            .unwrap();

        let names: Vec<String> = sink.emitted.borrow().iter().map(|(n, _)| n.clone()).collect();
        assert_eq!(names, vec!["harbour.webp", "harbour.webp"]);
        assert_eq!(
            response.value,
            Some(OutputValue::Img(Img {
                src: "/assets/harbour.webp".into(),
                w: 640,
                h: 480,
                srcset: Some("/assets/harbour.webp 320w, /assets/harbour.webp 640w".into()),
            }))
        );
    }

    // =========================================================================
    // Cache
    // =========================================================================

    #[test]
    fn second_request_hits_cache() {
        let tmp = TempDir::new().unwrap();
        let engine = Engine::new(
            MockBackend::new(500, 500, "jpeg"),
            EngineConfig::default(),
            VariantCache::new(tmp.path(), None),
        );
        let query = "w=100;200&format=webp&rotate=90";
        let first = engine.process(b"src", "a.jpg", query, serve()).unwrap().unwrap();
        engine.backend.clear_operations();

        let second = engine.process(b"src", "a.jpg", query, serve()).unwrap().unwrap();
        assert_eq!(engine.cache().stats().hits, 2);
        assert_eq!(engine.cache().stats().misses, 2);
        assert_eq!(first.metadatas, second.metadatas);
        assert_eq!(second.metadatas[0].rotate, Some(90));
        let ops = engine.backend.get_operations();
        assert!(!ops.contains(&RecordedOp::Open));
        assert!(!ops.contains(&RecordedOp::ToBuffer));
    }

    #[test]
    fn avif_reported_as_heif_is_normalized_on_hit() {
        let tmp = TempDir::new().unwrap();
        let mut backend = MockBackend::new(40, 40, "png");
        backend.avif_reports_heif = true;
        let engine = Engine::new(backend, EngineConfig::default(), VariantCache::new(tmp.path(), None));

        let miss = engine.process(b"src", "a.png", "format=avif", serve()).unwrap().unwrap();
        let hit = engine.process(b"src", "a.png", "format=avif", serve()).unwrap().unwrap();
        assert_eq!(engine.cache().stats().hits, 1);
        assert_eq!(miss.metadatas[0].format, "avif");
        assert_eq!(hit.metadatas[0].format, "avif");
    }

    #[test]
    fn full_cache_hit_never_decodes_source() {
        let tmp = TempDir::new().unwrap();
        let engine = Engine::new(
            MockBackend::new(64, 64, "png"),
            EngineConfig::default(),
            VariantCache::new(tmp.path(), None),
        );
        engine.process(b"src", "a.png", "flip", serve()).unwrap();
        assert_eq!(
            engine
                .backend
                .get_operations()
                .iter()
                .filter(|op| **op == RecordedOp::Open)
                .count(),
            1
        );
        engine.backend.clear_operations();

        engine.process(b"src", "a.png", "flip", serve()).unwrap();
        assert_eq!(engine.backend.get_operations(), vec![RecordedOp::Identify]);
    }

    #[test]
    fn source_decoded_once_for_many_misses() {
        let engine = engine(MockBackend::new(800, 600, "jpeg"));
        engine
            .process(b"src", "a.jpg", "w=100;200;300&format=webp;png", serve())
            .unwrap();
        let opens = engine
            .backend
            .get_operations()
            .iter()
            .filter(|op| **op == RecordedOp::Open)
            .count();
        assert_eq!(opens, 1);
    }

    #[test]
    fn different_source_bytes_miss() {
        let tmp = TempDir::new().unwrap();
        let engine = Engine::new(
            MockBackend::new(50, 50, "jpeg"),
            EngineConfig::default(),
            VariantCache::new(tmp.path(), None),
        );
        engine.process(b"one", "a.jpg", "flip", serve()).unwrap();
        engine.process(b"two", "a.jpg", "flip", serve()).unwrap();
        assert_eq!(engine.cache().stats().misses, 2);
        assert_eq!(engine.cache().stats().hits, 0);
    }

    #[test]
    fn served_reads_cached_bytes() {
        let tmp = TempDir::new().unwrap();
        let engine = Engine::new(
            MockBackend::new(30, 30, "png"),
            EngineConfig::default(),
            VariantCache::new(tmp.path(), None),
        );
        let response = engine
            .process(b"src", "a.png", "format=jpeg", serve())
            .unwrap()
            .unwrap();
        let id = response.metadatas[0]
            .src
            .rsplit('/')
            .next()
            .unwrap()
            .to_string();
        assert!(tmp.path().join(&id).exists());
        let (bytes, content_type) = engine.served(&id).unwrap().unwrap();
        assert_eq!(bytes, b"mock:30x30:jpeg");
        assert_eq!(content_type, "image/jpeg");
    }

    #[test]
    fn end_build_keeps_entries_used_this_build() {
        let tmp = TempDir::new().unwrap();
        let engine = Engine::new(
            MockBackend::new(30, 30, "png"),
            EngineConfig::default(),
            VariantCache::new(tmp.path(), Some(std::time::Duration::from_secs(1))),
        );
        std::fs::write(tmp.path().join("stale"), b"old").unwrap();
        std::fs::File::options()
            .write(true)
            .open(tmp.path().join("stale"))
            .unwrap()
            .set_modified(std::time::SystemTime::now() - std::time::Duration::from_secs(3600))
            .unwrap();

        engine.process(b"src", "a.png", "flip", serve()).unwrap();
        assert_eq!(engine.end_build().unwrap(), 1);
        assert!(!tmp.path().join("stale").exists());
        assert_eq!(std::fs::read_dir(tmp.path()).unwrap().count(), 2);
    }
}
