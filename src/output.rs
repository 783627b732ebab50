//! Output synthesis: from variant metadata to the value a caller imports.
//!
//! The `as` directive picks one of the registered output formats; without it
//! the result is the `url` format.
//!
//! | Format | Result |
//! |---|---|
//! | `url` | One URL, or a list when there are several variants |
//! | `srcset` | `"a.webp 300w, b.webp 900w"` (density descriptors win over widths) |
//! | `img` | `{ src, w, h, srcset? }` for the widest variant |
//! | `picture` | `{ sources: { format → srcset }, img }` |
//! | `metadata` / `meta` | The metadata records, optionally filtered to listed keys |
//!
//! ## Picture fallback
//!
//! The fallback format is the last distinct format in first-seen order, so
//! `format=avif;webp;jpg` falls back to JPEG. The `<img>` of a picture is the
//! widest fallback variant, and the fallback format only gets its own
//! `<source>` when it has at least two variants. Formats are compared with
//! `jpg` normalized to `jpeg`, as in MIME types.
//!
//! Formats are stateless functions of `(params, metadatas)`. Custom formats are
//! added with [`OutputFormats::with`], which returns a new registry.

use crate::metadata::ImageMetadata;
use crate::resolve::OutputSelector;
use serde::ser::{SerializeMap, Serializer};
use serde::Serialize;
use std::fmt;
use std::sync::Arc;
use thiserror::Error;

#[derive(Error, Debug, PartialEq)]
pub enum OutputError {
    #[error("could not determine image format of {0:?}")]
    MissingFormat(String),
    #[error("`{0}` output needs at least one variant")]
    NoVariants(&'static str),
}

/// `<img>` descriptor.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Img {
    pub src: String,
    pub w: u32,
    pub h: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub srcset: Option<String>,
}

/// `<picture>` descriptor. `sources` maps format → srcset, in first-seen
/// format order.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Picture {
    #[serde(serialize_with = "ordered_map")]
    pub sources: Vec<(String, String)>,
    pub img: Img,
}

fn ordered_map<S: Serializer>(entries: &[(String, String)], serializer: S) -> Result<S::Ok, S::Error> {
    let mut map = serializer.serialize_map(Some(entries.len()))?;
    for (k, v) in entries {
        map.serialize_entry(k, v)?;
    }
    map.end()
}

/// A synthesized output value.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum OutputValue {
    Text(String),
    List(Vec<String>),
    Img(Img),
    Picture(Picture),
    Json(serde_json::Value),
}

/// A stateless output format.
pub trait OutputFormat: Send + Sync {
    fn synthesize(
        &self,
        params: Option<&[String]>,
        metadatas: &[ImageMetadata],
    ) -> Result<OutputValue, OutputError>;
}

impl<F> OutputFormat for F
where
    F: Fn(Option<&[String]>, &[ImageMetadata]) -> Result<OutputValue, OutputError> + Send + Sync,
{
    fn synthesize(
        &self,
        params: Option<&[String]>,
        metadatas: &[ImageMetadata],
    ) -> Result<OutputValue, OutputError> {
        self(params, metadatas)
    }
}

/// Name of the format used when none (or an unknown one) is requested.
pub const DEFAULT_FORMAT: &str = "url";

/// Ordered, immutable registry of output formats.
#[derive(Clone, Default)]
pub struct OutputFormats {
    formats: Vec<(String, Arc<dyn OutputFormat>)>,
}

impl fmt::Debug for OutputFormats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.names()).finish()
    }
}

impl OutputFormats {
    pub fn builtins() -> Self {
        Self::default()
            .with("url", url)
            .with("srcset", srcset)
            .with("img", img)
            .with("picture", picture)
            .with("metadata", metadata)
            .with("meta", metadata)
    }

    /// A new registry with `format` registered under `name`, replacing any
    /// format of the same name.
    pub fn with(&self, name: impl Into<String>, format: impl OutputFormat + 'static) -> Self {
        let name = name.into();
        let mut formats = self.formats.clone();
        let format: Arc<dyn OutputFormat> = Arc::new(format);
        match formats.iter_mut().find(|(n, _)| *n == name) {
            Some((_, existing)) => *existing = format,
            None => formats.push((name, format)),
        }
        Self { formats }
    }

    pub fn get(&self, name: &str) -> Option<&dyn OutputFormat> {
        self.formats
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, f)| f.as_ref())
    }

    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    pub fn names(&self) -> Vec<&str> {
        self.formats.iter().map(|(n, _)| n.as_str()).collect()
    }

    /// Run the selected format, falling back to `url`.
    pub fn synthesize(
        &self,
        selector: Option<&OutputSelector>,
        metadatas: &[ImageMetadata],
    ) -> Result<OutputValue, OutputError> {
        if let Some(selector) = selector {
            if let Some(format) = self.get(&selector.name) {
                return format.synthesize(selector.params.as_deref(), metadatas);
            }
        }
        match self.get(DEFAULT_FORMAT) {
            Some(format) => format.synthesize(None, metadatas),
            None => url(None, metadatas),
        }
    }
}

/// Format name as used in MIME types (`jpg` → `jpeg`).
fn mime_format(meta: &ImageMetadata) -> Result<String, OutputError> {
    if meta.format.is_empty() {
        return Err(OutputError::MissingFormat(meta.src.clone()));
    }
    Ok(meta.format.replacen("jpg", "jpeg", 1))
}

/// `"<src> <density>"` or `"<src> <width>w"`, joined with `", "`.
pub fn srcset_of(metadatas: &[ImageMetadata]) -> String {
    metadatas
        .iter()
        .map(|meta| match &meta.pixel_density_descriptor {
            Some(density) => format!("{} {}", meta.src, density),
            None => format!("{} {}w", meta.src, meta.width),
        })
        .collect::<Vec<_>>()
        .join(", ")
}

/// The widest variant; ties go to the first.
fn widest<'a>(metadatas: impl IntoIterator<Item = &'a ImageMetadata>) -> Option<&'a ImageMetadata> {
    metadatas
        .into_iter()
        .fold(None, |best: Option<&ImageMetadata>, meta| match best {
            Some(b) if meta.width <= b.width => Some(b),
            _ => Some(meta),
        })
}

fn img_of(meta: &ImageMetadata) -> Img {
    Img {
        src: meta.src.clone(),
        w: meta.width,
        h: meta.height,
        srcset: None,
    }
}

pub fn url(
    _params: Option<&[String]>,
    metadatas: &[ImageMetadata],
) -> Result<OutputValue, OutputError> {
    let mut urls: Vec<String> = metadatas.iter().map(|m| m.src.clone()).collect();
    Ok(if urls.len() == 1 {
        OutputValue::Text(urls.remove(0))
    } else {
        OutputValue::List(urls)
    })
}

pub fn srcset(
    _params: Option<&[String]>,
    metadatas: &[ImageMetadata],
) -> Result<OutputValue, OutputError> {
    Ok(OutputValue::Text(srcset_of(metadatas)))
}

pub fn img(
    _params: Option<&[String]>,
    metadatas: &[ImageMetadata],
) -> Result<OutputValue, OutputError> {
    let largest = widest(metadatas).ok_or(OutputError::NoVariants("img"))?;
    let mut result = img_of(largest);
    if metadatas.len() >= 2 {
        result.srcset = Some(srcset_of(metadatas));
    }
    Ok(OutputValue::Img(result))
}

pub fn picture(
    _params: Option<&[String]>,
    metadatas: &[ImageMetadata],
) -> Result<OutputValue, OutputError> {
    let formats: Vec<String> = metadatas
        .iter()
        .map(mime_format)
        .collect::<Result<_, _>>()?;

    let mut distinct: Vec<&str> = Vec::new();
    for format in &formats {
        if !distinct.contains(&format.as_str()) {
            distinct.push(format);
        }
    }
    let fallback = *distinct.last().ok_or(OutputError::NoVariants("picture"))?;

    let in_fallback: Vec<&ImageMetadata> = metadatas
        .iter()
        .zip(&formats)
        .filter(|(_, f)| *f == fallback)
        .map(|(m, _)| m)
        .collect();
    let largest = widest(in_fallback.iter().copied()).ok_or(OutputError::NoVariants("picture"))?;

    let sources = distinct
        .iter()
        .filter(|f| **f != fallback || in_fallback.len() >= 2)
        .map(|f| {
            let group: Vec<ImageMetadata> = metadatas
                .iter()
                .zip(&formats)
                .filter(|(_, format)| format == f)
                .map(|(m, _)| m.clone())
                .collect();
            (f.to_string(), srcset_of(&group))
        })
        .collect();

    Ok(OutputValue::Picture(Picture {
        sources,
        img: img_of(largest),
    }))
}

/// The metadata records, restricted to `params` keys when given. One
/// variant yields an object, several an array.
pub fn metadata(
    params: Option<&[String]>,
    metadatas: &[ImageMetadata],
) -> Result<OutputValue, OutputError> {
    let mut records: Vec<serde_json::Value> = metadatas
        .iter()
        .map(|meta| {
            let mut value = meta.to_json();
            if let (Some(whitelist), Some(object)) = (params, value.as_object_mut()) {
                object.retain(|key, _| whitelist.iter().any(|w| w == key));
            }
            value
        })
        .collect();
    Ok(OutputValue::Json(if records.len() == 1 {
        records.remove(0)
    } else {
        serde_json::Value::Array(records)
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn meta(src: &str, width: u32, format: &str) -> ImageMetadata {
        ImageMetadata {
            src: src.into(),
            width,
            height: width / 2,
            format: format.into(),
            ..Default::default()
        }
    }

    fn selector(name: &str, params: Option<&[&str]>) -> OutputSelector {
        OutputSelector {
            name: name.into(),
            params: params.map(|p| p.iter().map(|s| s.to_string()).collect()),
        }
    }

    // =========================================================================
    // url / srcset
    // =========================================================================

    #[test]
    fn url_single_and_many() {
        let one = [meta("/a.webp", 300, "webp")];
        assert_eq!(url(None, &one).unwrap(), OutputValue::Text("/a.webp".into()));

        let two = [meta("/a.webp", 300, "webp"), meta("/b.webp", 600, "webp")];
        assert_eq!(
            url(None, &two).unwrap(),
            OutputValue::List(vec!["/a.webp".into(), "/b.webp".into()])
        );
    }

    #[test]
    fn srcset_widths_and_densities() {
        let mut metas = vec![meta("/a.webp", 300, "webp"), meta("/b.webp", 600, "webp")];
        assert_eq!(srcset_of(&metas), "/a.webp 300w, /b.webp 600w");

        metas[0].pixel_density_descriptor = Some("1x".into());
        metas[1].pixel_density_descriptor = Some("2x".into());
        assert_eq!(srcset_of(&metas), "/a.webp 1x, /b.webp 2x");
    }

    // =========================================================================
    // img
    // =========================================================================

    #[test]
    fn img_single_has_no_srcset() {
        let value = img(None, &[meta("/a.jpg", 300, "jpeg")]).unwrap();
        assert_eq!(
            value,
            OutputValue::Img(Img {
                src: "/a.jpg".into(),
                w: 300,
                h: 150,
                srcset: None
            })
        );
    }

    #[test]
    fn img_picks_widest_first_on_tie() {
        let metas = [
            meta("/a.webp", 300, "webp"),
            meta("/b.webp", 900, "webp"),
            meta("/c.jpeg", 900, "jpeg"),
        ];
        let OutputValue::Img(result) = img(None, &metas).unwrap() else {
            panic!("expected img");
        };
        assert_eq!(result.src, "/b.webp");
        assert_eq!(
            result.srcset.as_deref(),
            Some("/a.webp 300w, /b.webp 900w, /c.jpeg 900w")
        );
    }

    #[test]
    fn img_without_variants_errors() {
        assert_eq!(img(None, &[]), Err(OutputError::NoVariants("img")));
    }

    // =========================================================================
    // picture
    // =========================================================================

    #[test]
    fn picture_fallback_is_last_format() {
        let metas = [
            meta("/a.avif", 300, "avif"),
            meta("/b.avif", 600, "avif"),
            meta("/c.jpg", 300, "jpg"),
            meta("/d.jpg", 600, "jpg"),
        ];
        let OutputValue::Picture(result) = picture(None, &metas).unwrap() else {
            panic!("expected picture");
        };
        assert_eq!(
            result.sources,
            vec![
                ("avif".to_string(), "/a.avif 300w, /b.avif 600w".to_string()),
                ("jpeg".to_string(), "/c.jpg 300w, /d.jpg 600w".to_string()),
            ]
        );
        assert_eq!(result.img.src, "/d.jpg");
    }

    #[test]
    fn picture_single_fallback_has_no_source() {
        let metas = [meta("/a.webp", 600, "webp"), meta("/b.jpeg", 600, "jpeg")];
        let OutputValue::Picture(result) = picture(None, &metas).unwrap() else {
            panic!("expected picture");
        };
        assert_eq!(
            result.sources,
            vec![("webp".to_string(), "/a.webp 600w".to_string())]
        );
        assert_eq!(result.img.src, "/b.jpeg");
    }

    #[test]
    fn picture_fallback_uses_first_seen_order() {
        // webp first appears before jpeg, so jpeg is the fallback even though
        // webp is also the last entry.
        let metas = [
            meta("/a.webp", 300, "webp"),
            meta("/b.jpeg", 300, "jpeg"),
            meta("/c.webp", 600, "webp"),
        ];
        let OutputValue::Picture(result) = picture(None, &metas).unwrap() else {
            panic!("expected picture");
        };
        assert_eq!(result.img.src, "/b.jpeg");
        assert_eq!(result.sources.len(), 1);
    }

    #[test]
    fn picture_serializes_sources_in_order() {
        let metas = [
            meta("/a.webp", 300, "webp"),
            meta("/b.avif", 300, "avif"),
            meta("/c.png", 300, "png"),
        ];
        let value = serde_json::to_string(&picture(None, &metas).unwrap()).unwrap();
        assert_eq!(
            value,
            r#"{"sources":{"webp":"/a.webp 300w","avif":"/b.avif 300w"},"img":{"src":"/c.png","w":300,"h":150}}"#
        );
    }

    #[test]
    fn picture_requires_format() {
        let metas = [meta("/a", 300, "")];
        assert_eq!(
            picture(None, &metas),
            Err(OutputError::MissingFormat("/a".into()))
        );
    }

    // =========================================================================
    // metadata
    // =========================================================================

    #[test]
    fn metadata_whitelist_filters_keys() {
        let params = vec!["width".to_string(), "format".to_string()];
        let value = metadata(Some(&params), &[meta("/a.webp", 300, "webp")]).unwrap();
        assert_eq!(value, OutputValue::Json(json!({"width": 300, "format": "webp"})));
    }

    #[test]
    fn metadata_many_is_array() {
        let metas = [meta("/a.webp", 300, "webp"), meta("/b.webp", 600, "webp")];
        let OutputValue::Json(value) = metadata(None, &metas).unwrap() else {
            panic!("expected json");
        };
        assert_eq!(value.as_array().map(Vec::len), Some(2));
        assert_eq!(value[1]["src"], "/b.webp");
    }

    // =========================================================================
    // registry
    // =========================================================================

    #[test]
    fn builtin_names() {
        assert_eq!(
            OutputFormats::builtins().names(),
            vec!["url", "srcset", "img", "picture", "metadata", "meta"]
        );
    }

    #[test]
    fn unknown_or_missing_selector_falls_back_to_url() {
        let formats = OutputFormats::builtins();
        let metas = [meta("/a.webp", 300, "webp")];
        let expected = OutputValue::Text("/a.webp".into());
        assert_eq!(formats.synthesize(None, &metas).unwrap(), expected);
        assert_eq!(
            formats
                .synthesize(Some(&selector("nope", None)), &metas)
                .unwrap(),
            expected
        );
    }

    #[test]
    fn selector_params_reach_format() {
        let formats = OutputFormats::builtins();
        let value = formats
            .synthesize(
                Some(&selector("meta", Some(&["height"]))),
                &[meta("/a.webp", 300, "webp")],
            )
            .unwrap();
        assert_eq!(value, OutputValue::Json(json!({"height": 150})));
    }

    #[test]
    fn custom_format_registers_without_touching_builtins() {
        let formats = OutputFormats::builtins().with(
            "count",
            |_: Option<&[String]>, metas: &[ImageMetadata]| {
                Ok(OutputValue::Json(json!(metas.len())))
            },
        );
        assert!(formats.contains("count"));
        assert!(!OutputFormats::builtins().contains("count"));
        let value = formats
            .synthesize(Some(&selector("count", None)), &[meta("/a", 1, "png")])
            .unwrap();
        assert_eq!(value, OutputValue::Json(json!(1)));
    }
}
