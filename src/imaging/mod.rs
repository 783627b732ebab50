//! Image processing capability.
//!
//! The engine consumes pixels exclusively through the traits in [`backend`].
//! This module groups those traits with the parameter types they accept and
//! the pure dimension math shared by backends and the resize directive.
//!
//! | Module | Contents |
//! |---|---|
//! | [`backend`] | `ImageBackend` / `ImageHandle` traits, `BackendError`, `IntrinsicMetadata` |
//! | [`params`] | Validated option types: fit, position, kernel, colour, format, quality |
//! | [`calculations`] | Pure size math: fill / fit boxes, size requests, anchors, rotation bounds |
//! | [`rust_backend`] | `RustBackend`, built on the `image` crate |

pub mod backend;
pub mod calculations;
pub mod params;
pub mod rust_backend;

pub use backend::{BackendError, ImageBackend, ImageHandle, IntrinsicMetadata};
pub use calculations::{SizeRequest, resolve_size};
pub use params::{
    Color, Fit, FormatOptions, Kernel, Modulation, Position, Quality, ResizeOptions, TargetFormat,
};
pub use rust_backend::RustBackend;
