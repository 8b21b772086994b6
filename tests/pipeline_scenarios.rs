mod common;

use std::sync::Arc;
use std::time::Duration;

use common::{fixed_now, rejecting_factory, solid_factory, sunny, unreachable_factory, Hang, Ready, MARKUP_FILL};
use dashboard::pipeline::Dashboard;
use dashboard::rendering::raster::{MarkupTiles, VectorTiles};
use dashboard::source::Calendar;
use dashboard::widget::placeholder::placeholder_svg;
use dashboard::widget::{CalendarWidget, SensorsWidget, WeatherWidget};
use dashboard::{
    Bitmap, CanvasSpec, EngineFactory, Error, LayoutError, RasterBackend, Rect, Size, Slot, SourceResult,
    SourceValue,
};

const WEATHER: Size = Size::new(200, 80);
const CALENDAR: Size = Size::new(200, 120);

fn canvas(calendar_slot: Size) -> CanvasSpec {
    CanvasSpec::new(
        Size::new(220, 240),
        (255, 255, 255, 255),
        vec![
            Slot::new("weather", Rect::new(10, 10, 200, 90)),
            Slot::new("calendar", Rect::new(10, 110, calendar_slot.width, calendar_slot.height)),
        ],
    )
}

fn backend(factory: EngineFactory) -> RasterBackend {
    RasterBackend::new(
        VectorTiles::new(false).unwrap(),
        Some(MarkupTiles::new(factory, 1, Duration::from_secs(5))),
    )
}

fn dashboard(calendar_slot: Size, factory: EngineFactory) -> Dashboard {
    Dashboard::new(canvas(calendar_slot), backend(factory))
        .with_window(Duration::from_millis(200))
        .with_source(Arc::new(Ready {
            name: "weather",
            result: SourceResult::Success(SourceValue::Weather(sunny())),
        }))
        .with_source(Arc::new(Hang {
            name: "calendar".to_string(),
        }))
        .with_renderer(Box::new(WeatherWidget::new(WEATHER)))
        .with_renderer(Box::new(CalendarWidget::new(CALENDAR, 2)))
}

#[tokio::test]
async fn weather_renders_while_calendar_times_out() {
    let bitmap = dashboard(Size::new(200, 120), solid_factory())
        .run_at(fixed_now())
        .await
        .unwrap();
    assert_eq!((bitmap.width, bitmap.height), (220, 240));

    // Markup tile from the engine, at the weather slot
    let weather = bitmap.region(Rect::new(10, 10, WEATHER.width, WEATHER.height)).unwrap();
    assert!(weather.pixels.chunks(4).all(|p| p == MARKUP_FILL));
    // Slot area outside the natural size keeps the background
    assert_eq!(bitmap.pixel(15, 95), Some((255, 255, 255, 255)));

    // Calendar slot holds exactly the placeholder tile
    let tile = VectorTiles::new(false)
        .unwrap()
        .rasterize_svg(&placeholder_svg("Calendar", CALENDAR, "timeout"), CALENDAR)
        .unwrap();
    let calendar = bitmap.region(Rect::new(10, 110, CALENDAR.width, CALENDAR.height)).unwrap();
    assert_eq!(calendar, Bitmap::from_pixmap(&tile));
}

#[tokio::test]
async fn failed_markup_render_degrades_only_that_widget() {
    let dashboard = Dashboard::new(canvas(CALENDAR), backend(rejecting_factory(r#"<section class="calendar">"#)))
        .with_window(Duration::from_millis(200))
        .with_source(Arc::new(Ready {
            name: "weather",
            result: SourceResult::Success(SourceValue::Weather(sunny())),
        }))
        .with_source(Arc::new(Ready {
            name: "calendar",
            result: SourceResult::Success(SourceValue::Calendar(Calendar::from_events(std::iter::empty()))),
        }))
        .with_renderer(Box::new(WeatherWidget::new(WEATHER)))
        .with_renderer(Box::new(CalendarWidget::new(CALENDAR, 2)));

    let bitmap = dashboard.run_at(fixed_now()).await.unwrap();

    let weather = bitmap.region(Rect::new(10, 10, WEATHER.width, WEATHER.height)).unwrap();
    assert!(weather.pixels.chunks(4).all(|p| p == MARKUP_FILL));

    let tile = VectorTiles::new(false)
        .unwrap()
        .rasterize_svg(&placeholder_svg("Calendar", CALENDAR, "render failed"), CALENDAR)
        .unwrap();
    let calendar = bitmap.region(Rect::new(10, 110, CALENDAR.width, CALENDAR.height)).unwrap();
    assert_eq!(calendar, Bitmap::from_pixmap(&tile));
    assert!(!calendar.pixels.chunks(4).any(|p| p == MARKUP_FILL));

    // A bad document is not an engine failure; the next run still uses the pool
    assert!(dashboard.run_at(fixed_now()).await.is_ok());
    dashboard.shutdown().await.unwrap();
}

#[tokio::test]
async fn undersized_slot_is_a_layout_error() {
    let err = dashboard(Size::new(200, 100), solid_factory())
        .run_at(fixed_now())
        .await
        .unwrap_err();
    match err {
        Error::Layout(LayoutError::OversizeWidget { widget, natural, slot }) => {
            assert_eq!(widget, "calendar");
            assert_eq!(natural, CALENDAR);
            assert_eq!(slot, Size::new(200, 100));
        }
        other => panic!("expected OversizeWidget, got {:?}", other),
    }
}

#[tokio::test]
async fn unreachable_engine_is_a_service_failure() {
    let err = dashboard(Size::new(200, 120), unreachable_factory())
        .run_at(fixed_now())
        .await
        .unwrap_err();
    assert!(matches!(err, Error::RasterService(_)), "{:?}", err);
    assert!(err.is_fatal());
}

#[tokio::test]
async fn widget_without_a_source_is_a_placeholder() {
    let canvas = CanvasSpec::new(
        Size::new(400, 100),
        (255, 255, 255, 255),
        vec![Slot::new("sensors", Rect::new(0, 0, 400, 100))],
    );
    let dashboard = Dashboard::new(canvas, RasterBackend::vector_only(false).unwrap())
        .with_window(Duration::from_millis(50))
        .with_renderer(Box::new(SensorsWidget::new(Size::new(400, 100))));

    let bitmap = dashboard.run_at(fixed_now()).await.unwrap();
    let tile = VectorTiles::new(false)
        .unwrap()
        .rasterize_svg(&placeholder_svg("Sensors", Size::new(400, 100), "no data"), Size::new(400, 100))
        .unwrap();
    assert_eq!(bitmap, Bitmap::from_pixmap(&tile));
}

#[tokio::test]
async fn pool_survives_across_runs() {
    let dashboard = dashboard(Size::new(200, 120), solid_factory());
    let first = dashboard.run_at(fixed_now()).await.unwrap();
    let second = dashboard.run_at(fixed_now()).await.unwrap();
    assert_eq!(first.digest(), second.digest());
    dashboard.shutdown().await.unwrap();
}
