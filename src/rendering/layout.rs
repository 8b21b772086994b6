/// Slot-based layout: pins widgets into named rectangles on a fixed canvas

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::widget::Widget;
use crate::{Rgba, Size};

/// Axis-aligned rectangle, half-open on the right and bottom edges
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Rect {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

impl Rect {
    pub const fn new(x: u32, y: u32, width: u32, height: u32) -> Self {
        Self { x, y, width, height }
    }

    pub fn right(&self) -> u64 {
        u64::from(self.x) + u64::from(self.width)
    }

    pub fn bottom(&self) -> u64 {
        u64::from(self.y) + u64::from(self.height)
    }

    pub fn size(&self) -> Size {
        Size::new(self.width, self.height)
    }

    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }

    /// Touching edges do not count.
    pub fn intersects(&self, other: &Rect) -> bool {
        !self.is_empty()
            && !other.is_empty()
            && u64::from(self.x) < other.right()
            && u64::from(other.x) < self.right()
            && u64::from(self.y) < other.bottom()
            && u64::from(other.y) < self.bottom()
    }

    pub fn within(&self, size: Size) -> bool {
        self.right() <= u64::from(size.width) && self.bottom() <= u64::from(size.height)
    }
}

/// A named region of the canvas, as declared by a `[[slot]]` entry
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Slot {
    pub name: String,
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

impl Slot {
    pub fn new(name: impl Into<String>, rect: Rect) -> Self {
        Self {
            name: name.into(),
            x: rect.x,
            y: rect.y,
            width: rect.width,
            height: rect.height,
        }
    }

    pub fn rect(&self) -> Rect {
        Rect::new(self.x, self.y, self.width, self.height)
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LayoutError {
    #[error("widget '{widget}' is {natural} but its slot is only {slot}")]
    OversizeWidget { widget: String, natural: Size, slot: Size },

    #[error("no slot named '{widget}'")]
    UnknownSlot { widget: String },

    #[error("'{first}' overlaps '{second}'")]
    Overlap { first: String, second: String },

    #[error("'{name}' at {rect:?} leaves the {canvas} canvas")]
    OutOfBounds { name: String, rect: Rect, canvas: Size },

    #[error("'{name}' has zero area")]
    Degenerate { name: String },

    #[error("slot '{name}' is declared twice")]
    DuplicateSlot { name: String },
}

/// Canvas dimensions, background and slot table
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CanvasSpec {
    pub size: Size,
    pub background: Rgba,
    pub slots: Vec<Slot>,
}

impl CanvasSpec {
    pub fn new(size: Size, background: Rgba, slots: Vec<Slot>) -> Self {
        Self {
            size,
            background,
            slots,
        }
    }

    pub fn slot(&self, name: &str) -> Option<&Slot> {
        self.slots.iter().find(|s| s.name == name)
    }

    /// Check the slot table on its own: unique names, positive area, inside
    /// the canvas, and no two slots overlapping.
    pub fn validate(&self) -> Result<(), LayoutError> {
        if self.size.is_empty() {
            return Err(LayoutError::Degenerate {
                name: "canvas".to_string(),
            });
        }
        for (i, slot) in self.slots.iter().enumerate() {
            if self.slots[..i].iter().any(|s| s.name == slot.name) {
                return Err(LayoutError::DuplicateSlot {
                    name: slot.name.clone(),
                });
            }
            let rect = slot.rect();
            if rect.is_empty() {
                return Err(LayoutError::Degenerate {
                    name: slot.name.clone(),
                });
            }
            if !rect.within(self.size) {
                return Err(LayoutError::OutOfBounds {
                    name: slot.name.clone(),
                    rect,
                    canvas: self.size,
                });
            }
        }
        check_overlaps(self.slots.iter().map(|s| (s.name.as_str(), s.rect())))
    }
}

fn check_overlaps<'a>(rects: impl Iterator<Item = (&'a str, Rect)>) -> Result<(), LayoutError> {
    let rects: Vec<_> = rects.collect();
    for (i, (first, a)) in rects.iter().enumerate() {
        if let Some((second, _)) = rects[i + 1..].iter().find(|(_, b)| a.intersects(b)) {
            return Err(LayoutError::Overlap {
                first: first.to_string(),
                second: second.to_string(),
            });
        }
    }
    Ok(())
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Placement {
    pub widget: Widget,
    pub rect: Rect,
}

/// Canvas plus resolved placements, in widget declaration order
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ComposedSurface {
    size: Size,
    background: Rgba,
    placements: Vec<Placement>,
}

impl ComposedSurface {
    pub fn size(&self) -> Size {
        self.size
    }

    pub fn background(&self) -> Rgba {
        self.background
    }

    pub fn placements(&self) -> &[Placement] {
        &self.placements
    }

    pub fn placement(&self, name: &str) -> Option<&Placement> {
        self.placements.iter().find(|p| p.widget.name == name)
    }
}

/// Assign each widget to the slot of the same name.
///
/// The placement keeps the slot origin and the widget's natural size; there
/// is no scaling or reflow. Fails on the first widget that has no slot or
/// does not fit in it.
pub fn layout(widgets: &[Widget], canvas: &CanvasSpec) -> Result<ComposedSurface, LayoutError> {
    let mut placements = Vec::with_capacity(widgets.len());

    for widget in widgets {
        let slot = canvas.slot(&widget.name).ok_or_else(|| LayoutError::UnknownSlot {
            widget: widget.name.clone(),
        })?;
        if widget.size.is_empty() {
            return Err(LayoutError::Degenerate {
                name: widget.name.clone(),
            });
        }
        let bounds = slot.rect();
        if !widget.size.fits_within(bounds.size()) {
            return Err(LayoutError::OversizeWidget {
                widget: widget.name.clone(),
                natural: widget.size,
                slot: bounds.size(),
            });
        }
        let rect = Rect::new(bounds.x, bounds.y, widget.size.width, widget.size.height);
        if !rect.within(canvas.size) {
            return Err(LayoutError::OutOfBounds {
                name: widget.name.clone(),
                rect,
                canvas: canvas.size,
            });
        }
        placements.push(Placement {
            widget: widget.clone(),
            rect,
        });
    }

    check_overlaps(placements.iter().map(|p| (p.widget.name.as_str(), p.rect)))?;

    Ok(ComposedSurface {
        size: canvas.size,
        background: canvas.background,
        placements,
    })
}
