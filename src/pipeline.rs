//! Pipeline execution for one variant.

use crate::imaging::{BackendError, ImageHandle};
use crate::metadata::ImageMetadata;
use crate::transforms::Transform;

/// Apply `transforms` in order to `image`.
///
/// The metadata record is seeded from the handle before the first transform
/// and its width, height and format are read back from the handle after the
/// last one, so they always describe the encoded result. The first failing
/// transform aborts the variant.
pub fn apply_transforms(
    transforms: &[Transform],
    mut image: Box<dyn ImageHandle>,
    remove_metadata: bool,
) -> Result<(Box<dyn ImageHandle>, ImageMetadata), BackendError> {
    let mut meta = ImageMetadata::from_intrinsic(&image.metadata());
    image.keep_metadata(!remove_metadata);

    for transform in transforms {
        transform(image.as_mut(), &mut meta)?;
    }

    meta.sync_intrinsic(&image.metadata());
    Ok((image, meta))
}
