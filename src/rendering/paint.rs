/// Paint command set used by the compositor

use tiny_skia::{BlendMode, Color, IntRect, Paint, Pixmap, PixmapPaint, Transform};

use crate::{Error, Result, Rgba, Size};

#[derive(Debug, Clone, PartialEq)]
pub enum PaintCommand {
    /// Opaque fill, replacing whatever is underneath
    SolidRect {
        x: u32,
        y: u32,
        width: u32,
        height: u32,
        rgba: Rgba,
    },
    /// Border only, drawn inside the rectangle
    FrameRect {
        x: u32,
        y: u32,
        width: u32,
        height: u32,
        thickness: u32,
        rgba: Rgba,
    },
    /// A rasterized widget, cropped to `width`x`height`
    Tile {
        x: u32,
        y: u32,
        width: u32,
        height: u32,
        pixmap: Pixmap,
        transparent: bool,
    },
}

fn fill(target: &mut Pixmap, x: u32, y: u32, width: u32, height: u32, rgba: Rgba) {
    let Some(rect) = tiny_skia::Rect::from_xywh(x as f32, y as f32, width as f32, height as f32) else {
        return;
    };
    let mut paint = Paint::default();
    paint.set_color_rgba8(rgba.0, rgba.1, rgba.2, rgba.3);
    paint.anti_alias = false;
    paint.blend_mode = BlendMode::Source;
    target.fill_rect(rect, &paint, Transform::identity(), None);
}

/// Execute `commands` in order on a transparent canvas of `size`.
pub fn paint(size: Size, commands: &[PaintCommand]) -> Result<Pixmap> {
    let mut target = Pixmap::new(size.width, size.height)
        .ok_or_else(|| Error::RenderError(format!("Cannot allocate a {} canvas", size)))?;
    target.fill(Color::TRANSPARENT);

    for cmd in commands {
        match cmd {
            PaintCommand::SolidRect {
                x,
                y,
                width,
                height,
                rgba,
            } => fill(&mut target, *x, *y, *width, *height, *rgba),
            PaintCommand::FrameRect {
                x,
                y,
                width,
                height,
                thickness,
                rgba,
            } => {
                let t = (*thickness).min(*width / 2).min(*height / 2).max(1);
                fill(&mut target, *x, *y, *width, t, *rgba);
                fill(&mut target, *x, y + height - t, *width, t, *rgba);
                fill(&mut target, *x, *y, t, *height, *rgba);
                fill(&mut target, x + width - t, *y, t, *height, *rgba);
            }
            PaintCommand::Tile {
                x,
                y,
                width,
                height,
                pixmap,
                transparent,
            } => {
                let cropped;
                let tile = if pixmap.width() > *width || pixmap.height() > *height {
                    let area = IntRect::from_xywh(0, 0, (*width).min(pixmap.width()), (*height).min(pixmap.height()))
                        .ok_or_else(|| Error::RenderError("Empty tile".to_string()))?;
                    cropped = pixmap
                        .clone_rect(area)
                        .ok_or_else(|| Error::RenderError("Cannot crop tile".to_string()))?;
                    &cropped
                } else {
                    pixmap
                };
                let paint = PixmapPaint {
                    blend_mode: if *transparent {
                        BlendMode::SourceOver
                    } else {
                        BlendMode::Source
                    },
                    ..PixmapPaint::default()
                };
                target.draw_pixmap(*x as i32, *y as i32, tile.as_ref(), &paint, Transform::identity(), None);
            }
        }
    }

    Ok(target)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rgba_at(pixmap: &Pixmap, x: u32, y: u32) -> Rgba {
        let c = pixmap.pixel(x, y).unwrap().demultiply();
        (c.red(), c.green(), c.blue(), c.alpha())
    }

    fn solid(w: u32, h: u32, rgba: Rgba) -> Pixmap {
        let mut p = Pixmap::new(w, h).unwrap();
        p.fill(Color::from_rgba8(rgba.0, rgba.1, rgba.2, rgba.3));
        p
    }

    #[test]
    fn solid_rect_fills_exact_area() {
        let out = paint(
            Size::new(10, 10),
            &[PaintCommand::SolidRect {
                x: 2,
                y: 2,
                width: 3,
                height: 3,
                rgba: (255, 0, 0, 255),
            }],
        )
        .unwrap();
        assert_eq!(rgba_at(&out, 2, 2), (255, 0, 0, 255));
        assert_eq!(rgba_at(&out, 4, 4), (255, 0, 0, 255));
        assert_eq!(rgba_at(&out, 5, 5).3, 0);
    }

    #[test]
    fn frame_leaves_interior_alone() {
        let out = paint(
            Size::new(10, 10),
            &[PaintCommand::FrameRect {
                x: 0,
                y: 0,
                width: 10,
                height: 10,
                thickness: 2,
                rgba: (0, 0, 0, 255),
            }],
        )
        .unwrap();
        assert_eq!(rgba_at(&out, 0, 0), (0, 0, 0, 255));
        assert_eq!(rgba_at(&out, 9, 9), (0, 0, 0, 255));
        assert_eq!(rgba_at(&out, 5, 5).3, 0);
    }

    #[test]
    fn opaque_tiles_overwrite_and_are_cropped() {
        let background = PaintCommand::SolidRect {
            x: 0,
            y: 0,
            width: 10,
            height: 10,
            rgba: (255, 255, 255, 255),
        };
        let tile = PaintCommand::Tile {
            x: 1,
            y: 1,
            width: 4,
            height: 4,
            pixmap: solid(8, 8, (0, 0, 255, 0)),
            transparent: false,
        };
        let out = paint(Size::new(10, 10), &[background, tile]).unwrap();
        assert_eq!(rgba_at(&out, 1, 1).3, 0);
        assert_eq!(rgba_at(&out, 4, 4).3, 0);
        assert_eq!(rgba_at(&out, 5, 5), (255, 255, 255, 255));
    }

    #[test]
    fn transparent_tiles_blend() {
        let background = PaintCommand::SolidRect {
            x: 0,
            y: 0,
            width: 4,
            height: 4,
            rgba: (255, 255, 255, 255),
        };
        let tile = PaintCommand::Tile {
            x: 0,
            y: 0,
            width: 4,
            height: 4,
            pixmap: solid(4, 4, (0, 0, 0, 0)),
            transparent: true,
        };
        let out = paint(Size::new(4, 4), &[background, tile]).unwrap();
        assert_eq!(rgba_at(&out, 2, 2), (255, 255, 255, 255));
    }
}
