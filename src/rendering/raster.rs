/// Tile production and compositing

use std::time::{Duration, Instant};

use futures::future::{join_all, BoxFuture};
use log::{debug, warn};
use tiny_skia::{Pixmap, Transform};
use tokio::sync::OnceCell;

use super::layout::{ComposedSurface, Placement};
use super::optimize::SvgOptimizer;
use super::paint::{paint, PaintCommand};
use super::Bitmap;
use crate::pool::{EngineFactory, HeadlessPool};
use crate::widget::placeholder::placeholder_svg;
use crate::widget::{Widget, WidgetContent};
use crate::{Error, Result, Size};

const DEFAULT_STYLESHEET: &str = include_str!("../../assets/style.css");
const FALLBACK_FILL: (u8, u8, u8, u8) = (255, 255, 255, 255);
const FALLBACK_FRAME: (u8, u8, u8, u8) = (0, 0, 0, 255);

/// Turns one widget into a pixmap of its natural size
pub trait TileProducer: Send + Sync {
    fn produce<'a>(&'a self, widget: &'a Widget) -> BoxFuture<'a, Result<Pixmap>>;
}

/// In-process SVG rasterizer
pub struct VectorTiles {
    optimizer: SvgOptimizer,
}

impl VectorTiles {
    pub fn new(load_system_fonts: bool) -> Result<Self> {
        Ok(Self {
            optimizer: SvgOptimizer::new(load_system_fonts)?,
        })
    }

    pub fn rasterize_svg(&self, svg: &str, size: Size) -> Result<Pixmap> {
        let optimized = self.optimizer.optimize(svg)?;
        let tree = self.optimizer.parse(&optimized)?;

        let mut pixmap = Pixmap::new(size.width, size.height)
            .ok_or_else(|| Error::RenderError(format!("Cannot allocate a {} tile", size)))?;
        let natural = tree.size();
        let transform = Transform::from_scale(
            size.width as f32 / natural.width(),
            size.height as f32 / natural.height(),
        );
        resvg::render(&tree, transform, &mut pixmap.as_mut());
        Ok(pixmap)
    }
}

impl TileProducer for VectorTiles {
    fn produce<'a>(&'a self, widget: &'a Widget) -> BoxFuture<'a, Result<Pixmap>> {
        Box::pin(async move {
            match &widget.content {
                WidgetContent::Svg(svg) => self.rasterize_svg(svg, widget.size),
                WidgetContent::Html(_) => Err(Error::RenderError(format!("'{}' is not a vector widget", widget.name))),
            }
        })
    }
}

/// Screenshots HTML fragments through the headless worker pool
///
/// The pool is launched on first use so a dashboard without markup widgets
/// never starts a browser.
pub struct MarkupTiles {
    pool: OnceCell<HeadlessPool>,
    factory: EngineFactory,
    workers: usize,
    render_timeout: Duration,
    stylesheet: String,
}

impl MarkupTiles {
    pub fn new(factory: EngineFactory, workers: usize, render_timeout: Duration) -> Self {
        Self {
            pool: OnceCell::new(),
            factory,
            workers,
            render_timeout,
            stylesheet: DEFAULT_STYLESHEET.to_string(),
        }
    }

    pub fn with_stylesheet(mut self, css: impl Into<String>) -> Self {
        self.stylesheet = css.into();
        self
    }

    /// Wrap a fragment in a full document with the body pinned to `size`.
    pub fn document(&self, fragment: &str, size: Size) -> String {
        format!(
            "<!DOCTYPE html><html><head><meta charset=\"utf-8\"><style>{css}</style>\
             <style>html,body{{margin:0;padding:0;overflow:hidden;width:{w}px;height:{h}px}}</style>\
             </head><body>{body}</body></html>",
            css = self.stylesheet,
            w = size.width,
            h = size.height,
            body = fragment,
        )
    }

    async fn pool(&self) -> Result<&HeadlessPool> {
        self.pool
            .get_or_try_init(|| HeadlessPool::launch(self.workers, self.factory.clone(), self.render_timeout))
            .await
    }

    fn begin_run(&self) {
        if let Some(pool) = self.pool.get() {
            pool.begin_run();
        }
    }

    async fn shutdown(&self) -> Result<()> {
        match self.pool.get() {
            Some(pool) => pool.shutdown().await,
            None => Ok(()),
        }
    }
}

impl TileProducer for MarkupTiles {
    fn produce<'a>(&'a self, widget: &'a Widget) -> BoxFuture<'a, Result<Pixmap>> {
        Box::pin(async move {
            let WidgetContent::Html(fragment) = &widget.content else {
                return Err(Error::RenderError(format!("'{}' is not a markup widget", widget.name)));
            };
            let pool = self.pool().await?;
            let png = pool.render(self.document(fragment, widget.size), widget.size).await?;
            Pixmap::decode_png(&png).map_err(|e| Error::RenderError(format!("Invalid screenshot: {}", e)))
        })
    }
}

/// Rasterizes a composed surface into the final bitmap
pub struct RasterBackend {
    vector: VectorTiles,
    markup: Option<MarkupTiles>,
}

impl RasterBackend {
    pub fn new(vector: VectorTiles, markup: Option<MarkupTiles>) -> Self {
        Self { vector, markup }
    }

    /// Vector widgets only; any markup widget is a service failure.
    pub fn vector_only(load_system_fonts: bool) -> Result<Self> {
        Ok(Self::new(VectorTiles::new(load_system_fonts)?, None))
    }

    fn producer(&self, widget: &Widget) -> Option<&dyn TileProducer> {
        match widget.content {
            WidgetContent::Svg(_) => Some(&self.vector as &dyn TileProducer),
            WidgetContent::Html(_) => self.markup.as_ref().map(|m| m as &dyn TileProducer),
        }
    }

    async fn produce(&self, widget: &Widget) -> Result<Pixmap> {
        match self.producer(widget) {
            Some(producer) => producer.produce(widget).await,
            None => Err(Error::RasterService(format!(
                "no markup renderer configured for '{}'",
                widget.name
            ))),
        }
    }

    fn degraded_svg(widget: &Widget) -> String {
        placeholder_svg(&widget.title, widget.size, "render failed")
    }

    /// Placeholder tile for a widget whose own tile failed, or a plain framed
    /// box if even that cannot be drawn.
    fn degraded(&self, placement: &Placement) -> PaintCommand {
        let Placement { widget, rect } = placement;
        let svg = Self::degraded_svg(widget);
        match self.vector.rasterize_svg(&svg, widget.size) {
            Ok(pixmap) => PaintCommand::Tile {
                x: rect.x,
                y: rect.y,
                width: rect.width,
                height: rect.height,
                pixmap,
                transparent: false,
            },
            Err(err) => {
                warn!("placeholder for '{}' failed: {}", widget.name, err);
                PaintCommand::FrameRect {
                    x: rect.x,
                    y: rect.y,
                    width: rect.width,
                    height: rect.height,
                    thickness: 2,
                    rgba: FALLBACK_FRAME,
                }
            }
        }
    }

    /// Produce every tile concurrently, then composite them in declaration
    /// order over the background.
    pub async fn rasterize(&self, surface: &ComposedSurface) -> Result<Bitmap> {
        let started = Instant::now();
        if let Some(markup) = &self.markup {
            markup.begin_run();
        }

        let placements = surface.placements();
        let tiles = join_all(placements.iter().map(|p| self.produce(&p.widget))).await;

        let size = surface.size();
        let mut commands = Vec::with_capacity(placements.len() * 2 + 1);
        commands.push(PaintCommand::SolidRect {
            x: 0,
            y: 0,
            width: size.width,
            height: size.height,
            rgba: surface.background(),
        });

        for (placement, tile) in placements.iter().zip(tiles) {
            let rect = placement.rect;
            match tile {
                Ok(pixmap) => commands.push(PaintCommand::Tile {
                    x: rect.x,
                    y: rect.y,
                    width: rect.width,
                    height: rect.height,
                    pixmap,
                    transparent: placement.widget.transparent,
                }),
                Err(err) if err.is_service_failure() => {
                    return Err(match err {
                        Error::RasterService(_) => err,
                        other => Error::RasterService(other.to_string()),
                    });
                }
                Err(err) => {
                    warn!("widget '{}' degraded: {}", placement.widget.name, err);
                    commands.push(PaintCommand::SolidRect {
                        x: rect.x,
                        y: rect.y,
                        width: rect.width,
                        height: rect.height,
                        rgba: FALLBACK_FILL,
                    });
                    commands.push(self.degraded(placement));
                }
            }
        }

        let pixmap = paint(size, &commands)?;
        debug!("rasterized {} tiles in {:?}", placements.len(), started.elapsed());
        Ok(Bitmap::from_pixmap(&pixmap))
    }

    pub async fn shutdown(&self) -> Result<()> {
        match &self.markup {
            Some(markup) => markup.shutdown().await,
            None => Ok(()),
        }
    }
}
