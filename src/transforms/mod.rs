//! Transform factories and pipeline building.
//!
//! A **factory** inspects one [`ResolvedConfig`] and either declines (`None`)
//! or returns a [`Transform`]: a closure that mutates an [`ImageHandle`] and
//! records what it did in the variant's [`ImageMetadata`]. Factories never
//! fail. A directive they cannot make sense of is simply not consumed, and
//! [`build_pipeline`] reports every directive nobody consumed as a warning.
//!
//! ## Built-in order
//!
//! The registry order is the pipeline order:
//!
//! | # | Factory | Directives |
//! |---|---|---|
//! | 1 | `flatten` | `flatten`, `background` |
//! | 2 | `resize` | `w`, `h`, `aspect`/`ar`, `fit`, `position`, `kernel`, `background`, `allowUpscale`, `basePixels` |
//! | 3 | `rotate` | `rotate`, `background` |
//! | 4 | `flip` / `flop` | `flip`, `flop` |
//! | 5 | `blur` / `median` | `blur`, `median` |
//! | 6 | `tint` / `grayscale` / `hsb` | `tint`, `grayscale`, `hue`, `saturation`, `brightness` |
//! | 7 | `invert` / `normalize` | `invert`, `normalize` |
//! | 8 | `format` | `format`, `quality`, `progressive`, `lossless` |
//!
//! Flattening runs first so later geometry sees an opaque image, and encoding
//! settings run last.
//!
//! ## Shorthands
//!
//! Some directive values double as keys: `&cover` means `fit=cover` and
//! `&right+top` means `position=right top`. See [`SHORTHANDS`]. A shorthand
//! only applies when its own value is empty.

pub mod color;
pub mod filter;
pub mod format;
pub mod geometry;
pub mod options;
pub mod parse;
pub mod resize;

use crate::directives::DirectiveSet;
use crate::imaging::{BackendError, Fit, ImageHandle, Position};
use crate::logger::Logger;
use crate::metadata::ImageMetadata;
use crate::resolve::ResolvedConfig;
use std::collections::BTreeSet;
use std::fmt;
use std::sync::{Arc, LazyLock};

/// One step of a variant's pipeline.
pub type Transform = Box<
    dyn Fn(&mut dyn ImageHandle, &mut ImageMetadata) -> Result<(), BackendError> + Send + Sync,
>;

/// Box a closure as a [`Transform`].
pub fn transform<F>(f: F) -> Transform
where
    F: Fn(&mut dyn ImageHandle, &mut ImageMetadata) -> Result<(), BackendError>
        + Send
        + Sync
        + 'static,
{
    Box::new(f)
}

type BuildFn =
    dyn Fn(&ResolvedConfig, &mut FactoryContext<'_>) -> Option<Transform> + Send + Sync;

/// A named transform factory.
#[derive(Clone)]
pub struct TransformFactory {
    name: String,
    build: Arc<BuildFn>,
}

impl TransformFactory {
    pub fn new<F>(name: impl Into<String>, build: F) -> Self
    where
        F: Fn(&ResolvedConfig, &mut FactoryContext<'_>) -> Option<Transform>
            + Send
            + Sync
            + 'static,
    {
        Self {
            name: name.into(),
            build: Arc::new(build),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn build(&self, config: &ResolvedConfig, ctx: &mut FactoryContext<'_>) -> Option<Transform> {
        (self.build)(config, ctx)
    }
}

impl fmt::Debug for TransformFactory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TransformFactory")
            .field("name", &self.name)
            .finish()
    }
}

/// Per-build state handed to every factory.
pub struct FactoryContext<'a> {
    used: BTreeSet<String>,
    query: &'a DirectiveSet,
    logger: &'a dyn Logger,
}

impl<'a> FactoryContext<'a> {
    pub fn new(query: &'a DirectiveSet, logger: &'a dyn Logger) -> Self {
        Self {
            used: BTreeSet::new(),
            query,
            logger,
        }
    }

    /// Mark a directive as consumed.
    pub fn use_param(&mut self, key: &str) {
        self.used.insert(key.to_string());
    }

    pub fn is_used(&self, key: &str) -> bool {
        self.used.contains(key)
    }

    /// The multi-valued directives of the whole request.
    pub fn query(&self) -> &DirectiveSet {
        self.query
    }

    pub fn logger(&self) -> &dyn Logger {
        self.logger
    }
}

/// Ordered, immutable collection of factories.
#[derive(Clone, Debug, Default)]
pub struct FactoryRegistry {
    factories: Vec<TransformFactory>,
}

static BUILTINS: LazyLock<FactoryRegistry> = LazyLock::new(|| {
    FactoryRegistry::from_factories(vec![
        TransformFactory::new("flatten", color::flatten),
        TransformFactory::new("resize", resize::resize),
        TransformFactory::new("rotate", geometry::rotate),
        TransformFactory::new("flip", geometry::flip),
        TransformFactory::new("flop", geometry::flop),
        TransformFactory::new("blur", filter::blur),
        TransformFactory::new("median", filter::median),
        TransformFactory::new("tint", color::tint),
        TransformFactory::new("grayscale", color::grayscale),
        TransformFactory::new("hsb", color::hsb),
        TransformFactory::new("invert", color::invert),
        TransformFactory::new("normalize", color::normalize),
        TransformFactory::new("format", format::format),
    ])
});

impl FactoryRegistry {
    /// The built-in factories in pipeline order.
    pub fn builtins() -> Self {
        BUILTINS.clone()
    }

    pub fn from_factories(factories: Vec<TransformFactory>) -> Self {
        Self { factories }
    }

    /// A new registry with `factory` appended.
    pub fn with(&self, factory: TransformFactory) -> Self {
        self.extend([factory])
    }

    /// A new registry with `factories` appended.
    pub fn extend(&self, factories: impl IntoIterator<Item = TransformFactory>) -> Self {
        let mut next = self.factories.clone();
        next.extend(factories);
        Self { factories: next }
    }

    pub fn names(&self) -> Vec<&str> {
        self.factories.iter().map(TransformFactory::name).collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = &TransformFactory> {
        self.factories.iter()
    }

    pub fn len(&self) -> usize {
        self.factories.len()
    }

    pub fn is_empty(&self) -> bool {
        self.factories.is_empty()
    }
}

/// Directives consumed outside the transform pipeline.
pub const RESERVED: &[&str] = &["inline"];

/// Shorthand key → (directive, value).
pub static SHORTHANDS: LazyLock<Vec<(&'static str, &'static str, &'static str)>> =
    LazyLock::new(|| {
        Fit::ALL
            .iter()
            .map(|name| (*name, "fit", *name))
            .chain(Position::ALL.iter().map(|name| (*name, "position", *name)))
            .collect()
    });

/// The transforms for one variant plus the directives they consumed.
pub struct Pipeline {
    pub transforms: Vec<Transform>,
    pub used: BTreeSet<String>,
}

impl fmt::Debug for Pipeline {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Pipeline")
            .field("transforms", &self.transforms.len())
            .field("used", &self.used)
            .finish()
    }
}

/// Run every factory of `registry` over `config`, in order.
///
/// Each config key that no factory consumed (and that is not reserved) is
/// reported once through `logger.warn`.
pub fn build_pipeline(
    config: &ResolvedConfig,
    registry: &FactoryRegistry,
    query: &DirectiveSet,
    logger: &dyn Logger,
) -> Pipeline {
    let mut ctx = FactoryContext::new(query, logger);
    for key in RESERVED {
        if config.contains(key) {
            ctx.use_param(key);
        }
    }

    let transforms: Vec<Transform> = registry
        .iter()
        .filter_map(|factory| factory.build(config, &mut ctx))
        .collect();

    for key in config.keys() {
        if !ctx.is_used(key) {
            logger.warn(&format!(
                "directive `{key}={}` was not used by any transform",
                config.get(key).unwrap_or_default()
            ));
        }
    }

    Pipeline {
        transforms,
        used: ctx.used,
    }
}
