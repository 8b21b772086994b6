//! Minimal SVG document writer used by the vector widgets

use std::fmt::Write;

use super::escape;

/// `text-anchor` values
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Anchor {
    Start,
    Middle,
    End,
}

impl Anchor {
    fn as_str(&self) -> &'static str {
        match self {
            Anchor::Start => "start",
            Anchor::Middle => "middle",
            Anchor::End => "end",
        }
    }
}

/// Path data (`d` attribute) built from absolute move/line commands
#[derive(Debug, Clone, Default)]
pub struct PathData(String);

impl PathData {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn move_to(mut self, x: f64, y: f64) -> Self {
        let _ = write!(self.0, "M{:.3},{:.3}", x, y);
        self
    }

    pub fn line_to(mut self, x: f64, y: f64) -> Self {
        let _ = write!(self.0, "L{:.3},{:.3}", x, y);
        self
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// An SVG document of fixed pixel size
#[derive(Debug, Clone)]
pub struct SvgDocument {
    width: u32,
    height: u32,
    body: String,
}

impl SvgDocument {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            body: String::new(),
        }
    }

    pub fn rect(&mut self, x: f64, y: f64, width: f64, height: f64, fill: &str) -> &mut Self {
        let _ = write!(
            self.body,
            r#"<rect x="{:.3}" y="{:.3}" width="{:.3}" height="{:.3}" fill="{}"/>"#,
            x,
            y,
            width,
            height,
            escape(fill)
        );
        self
    }

    /// Unfilled rectangle, optionally dashed
    pub fn frame(
        &mut self,
        x: f64,
        y: f64,
        width: f64,
        height: f64,
        stroke_width: f64,
        dash: Option<(f64, f64)>,
    ) -> &mut Self {
        let dash_attr = dash
            .map(|(on, off)| format!(r#" stroke-dasharray="{:.3} {:.3}""#, on, off))
            .unwrap_or_default();
        let _ = write!(
            self.body,
            r#"<rect x="{:.3}" y="{:.3}" width="{:.3}" height="{:.3}" fill="none" stroke="black" stroke-width="{:.3}"{}/>"#,
            x, y, width, height, stroke_width, dash_attr
        );
        self
    }

    pub fn path(&mut self, data: &PathData, stroke_width: f64) -> &mut Self {
        let _ = write!(
            self.body,
            r#"<path d="{}" fill="none" stroke="black" stroke-width="{:.3}" stroke-linejoin="round" stroke-linecap="round"/>"#,
            data.0, stroke_width
        );
        self
    }

    pub fn text(&mut self, x: f64, y: f64, font_size: f64, anchor: Anchor, content: &str) -> &mut Self {
        let _ = write!(
            self.body,
            r#"<text x="{:.3}" y="{:.3}" font-size="{:.3}" font-family="sans-serif" text-anchor="{}" fill="black">{}</text>"#,
            x,
            y,
            font_size,
            anchor.as_str(),
            escape(content)
        );
        self
    }

    pub fn finish(&self) -> String {
        format!(
            r#"<svg xmlns="http://www.w3.org/2000/svg" width="{w}" height="{h}" viewBox="0 0 {w} {h}">{body}</svg>"#,
            w = self.width,
            h = self.height,
            body = self.body
        )
    }
}
