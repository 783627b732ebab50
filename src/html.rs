//! HTML rendering of `img` and `picture` descriptors.
//!
//! ```html
//! <picture>
//!   <source type="image/avif" srcset="/a.avif 300w, /b.avif 900w">
//!   <img src="/c.jpg" width="900" height="600" alt="">
//! </picture>
//! ```

use crate::output::{Img, OutputValue, Picture};
use maud::{Markup, html};

pub fn render_img(img: &Img, alt: &str) -> Markup {
    html! {
        img src=(img.src) srcset=[img.srcset.as_deref()] width=(img.w) height=(img.h) alt=(alt);
    }
}

pub fn render_picture(picture: &Picture, alt: &str) -> Markup {
    html! {
        picture {
            @for (format, srcset) in &picture.sources {
                source type=(format!("image/{format}")) srcset=(srcset);
            }
            (render_img(&picture.img, alt))
        }
    }
}

/// Markup for outputs that describe an element; `None` for the rest.
pub fn render(value: &OutputValue, alt: &str) -> Option<Markup> {
    match value {
        OutputValue::Img(img) => Some(render_img(img, alt)),
        OutputValue::Picture(picture) => Some(render_picture(picture, alt)),
        _ => None,
    }
}
