//! Per-variant metadata record.
//!
//! Every processed variant is described by one [`ImageMetadata`]. The pipeline
//! seeds it from the decoded source ([`ImageMetadata::from_intrinsic`]), each
//! transform records what it did, and the engine fills in `src` once the
//! variant has been delivered. Output formats read nothing else.
//!
//! ## Serialization
//!
//! The record serializes in camelCase with absent annotations omitted:
//!
//! ```json
//! { "src": "/@imagetools/3f2a…", "width": 300, "height": 200, "format": "webp",
//!   "pixelDensityDescriptor": "2x", "rotate": 90, "backgroundDirective": "#fff" }
//! ```
//!
//! Annotations the built-in transforms know about are typed fields. Custom
//! transforms write arbitrary JSON into [`ImageMetadata::extra`], which is
//! flattened into the same object. The cache stores this record as the JSON
//! sidecar of each entry, so annotations survive cache hits.

use crate::imaging::IntrinsicMetadata;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// What a blur transform recorded: an explicit sigma, or `true` for the
/// backend's mild default blur.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum BlurAnnotation {
    Default(bool),
    Sigma(f32),
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImageMetadata {
    #[serde(default)]
    pub src: String,
    pub width: u32,
    pub height: u32,
    pub format: String,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub has_alpha: bool,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pixel_density_descriptor: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub quality: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub progressive: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lossless: Option<bool>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub blur: Option<BlurAnnotation>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rotate: Option<i32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub flip: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub flop: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub flatten: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub grayscale: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub invert: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub normalize: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub median: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tint: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hue: Option<i32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub saturation: Option<f32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub brightness: Option<f32>,
    /// Raw `background` directive used by rotate / flatten / resize.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub background_directive: Option<String>,

    /// Annotations written by user-defined transforms.
    #[serde(flatten)]
    pub extra: BTreeMap<String, serde_json::Value>,
}

impl ImageMetadata {
    /// Seed a record from what the backend reports about a decoded image.
    pub fn from_intrinsic(intrinsic: &IntrinsicMetadata) -> Self {
        Self {
            width: intrinsic.width,
            height: intrinsic.height,
            format: intrinsic.format.clone(),
            has_alpha: intrinsic.has_alpha,
            ..Default::default()
        }
    }

    /// Overwrite dimensions and format with the backend's view after processing.
    pub fn sync_intrinsic(&mut self, intrinsic: &IntrinsicMetadata) {
        self.width = intrinsic.width;
        self.height = intrinsic.height;
        self.format = intrinsic.format.clone();
        self.has_alpha = intrinsic.has_alpha;
    }

    /// Record a custom annotation.
    pub fn annotate(&mut self, key: impl Into<String>, value: impl Into<serde_json::Value>) {
        self.extra.insert(key.into(), value.into());
    }

    /// The record as a JSON object, as output formats and the CLI see it.
    pub fn to_json(&self) -> serde_json::Value {
        serde_json::to_value(self).unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn base() -> ImageMetadata {
        ImageMetadata {
            src: "/a.webp".into(),
            width: 300,
            height: 200,
            format: "webp".into(),
            ..Default::default()
        }
    }

    #[test]
    fn serializes_camel_case_and_omits_absent() {
        let mut meta = base();
        meta.pixel_density_descriptor = Some("2x".into());
        meta.background_directive = Some("#fff".into());

        assert_eq!(
            meta.to_json(),
            json!({
                "src": "/a.webp",
                "width": 300,
                "height": 200,
                "format": "webp",
                "pixelDensityDescriptor": "2x",
                "backgroundDirective": "#fff"
            })
        );
    }

    #[test]
    fn extra_annotations_flatten_into_record() {
        let mut meta = base();
        meta.annotate("watermark", "corner");
        let value = meta.to_json();
        assert_eq!(value["watermark"], "corner");
        assert!(value.get("extra").is_none());
    }

    #[test]
    fn blur_annotation_forms() {
        let mut meta = base();
        meta.blur = Some(BlurAnnotation::Default(true));
        assert_eq!(meta.to_json()["blur"], json!(true));
        meta.blur = Some(BlurAnnotation::Sigma(2.5));
        assert_eq!(meta.to_json()["blur"], json!(2.5));
    }

    #[test]
    fn sidecar_json_restores_annotations() {
        let mut meta = base();
        meta.rotate = Some(90);
        meta.tint = Some("#ff0000".into());
        meta.annotate("custom", 7);

        let text = serde_json::to_string(&meta).unwrap();
        let restored: ImageMetadata = serde_json::from_str(&text).unwrap();
        assert_eq!(restored, meta);
    }

    #[test]
    fn from_intrinsic_seeds_dimensions() {
        let meta = ImageMetadata::from_intrinsic(&IntrinsicMetadata {
            width: 10,
            height: 20,
            format: "png".into(),
            has_alpha: true,
        });
        assert_eq!((meta.width, meta.height), (10, 20));
        assert_eq!(meta.format, "png");
        assert!(meta.has_alpha);
        assert!(meta.src.is_empty());
    }
}
