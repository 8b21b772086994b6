//! The "unavailable" tile drawn in place of a widget whose data or
//! rendering failed

use super::svg::{Anchor, SvgDocument};
use super::Widget;
use crate::Size;

/// Placeholder with the same name and size as the widget it replaces.
///
/// Always a vector widget so it never depends on the headless engine.
pub fn placeholder(name: &str, title: &str, size: Size, reason: &str) -> Widget {
    Widget::vector(name, size, placeholder_svg(title, size, reason)).with_title(title)
}

pub fn placeholder_svg(title: &str, size: Size, reason: &str) -> String {
    let (w, h) = (f64::from(size.width), f64::from(size.height));
    let title_size = (h / 5.0).clamp(8.0, 28.0);
    let reason_size = (title_size * 0.7).max(8.0);
    let center = w / 2.0;
    let middle = h / 2.0;

    let mut doc = SvgDocument::new(size.width, size.height);
    doc.rect(0.0, 0.0, w, h, "white")
        .frame(2.0, 2.0, (w - 4.0).max(0.0), (h - 4.0).max(0.0), 2.0, Some((8.0, 6.0)))
        .text(center, middle, title_size, Anchor::Middle, title)
        .text(
            center,
            middle + reason_size * 1.4,
            reason_size,
            Anchor::Middle,
            &format!("Unavailable ({})", reason),
        );
    doc.finish()
}
