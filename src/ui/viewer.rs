/// Visualization tab: selected image, navigation, thumbnail strip and trend chart
use iced::widget::scrollable::{Direction, Scrollbar};
use iced::widget::{button, column, container, image, row, scrollable, text, Row, Stack};
use iced::{Alignment, Color, ContentFit, Element, Length, Padding};

use crate::app::{self, Message, Preview, ProjectView, Thumb};
use crate::state::data::NdviRecord;
use crate::state::results::ResultIndex;
use crate::state::timeline::{self, ThumbnailStrip};
use crate::ui::chart::{ChartCache, PADDING};

const VIEWER_WIDTH: f32 = 640.0;
const VIEWER_HEIGHT: f32 = 420.0;
const THUMB_SIZE: f32 = 120.0;

pub fn view<'a>(
    view: &'a ProjectView,
    results: &'a ResultIndex,
    chart: &'a ChartCache,
) -> Element<'a, Message> {
    if results.is_empty() {
        let message = if results.is_loading() {
            "Loading NDVI results..."
        } else {
            "No NDVI images yet. Upload imagery in the Add Images tab."
        };
        return column![
            text(message),
            button("Refresh").on_press(Message::RefreshResults).padding(8),
        ]
        .spacing(12)
        .into();
    }

    let controls = row![
        button("◀").on_press(Message::Previous).padding(8),
        text(timeline::position_label(results)).size(16),
        button("▶").on_press(Message::Next).padding(8),
        button(text(format!("Show {}", view.layer.toggled().label())))
            .on_press(Message::ToggleLayer)
            .padding(8),
        button("−").on_press(Message::ZoomOut).padding(8),
        text(format!("{}%", view.zoom.percent())),
        button("+").on_press(Message::ZoomIn).padding(8),
        button("Reset").on_press(Message::ZoomReset).padding(8),
        button("Refresh").on_press(Message::RefreshResults).padding(8),
    ]
    .spacing(8)
    .align_y(Alignment::Center);

    let selected = results.current();
    let viewer = row![main_image(view, selected), record_details(selected)].spacing(20);

    column![
        controls,
        viewer,
        thumbnail_strip(view, results),
        text("NDVI Trend").size(20),
        trend_chart(chart),
    ]
    .spacing(16)
    .into()
}

fn main_image<'a>(view: &'a ProjectView, selected: Option<&NdviRecord>) -> Element<'a, Message> {
    let preview = selected.and_then(|r| view.previews.get(&(r.id, view.layer)));

    let content: Element<Message> = match (selected, preview) {
        (None, _) => text("No image selected").into(),
        (Some(_), None | Some(Preview::Loading)) => text("Loading image...").into(),
        (Some(_), Some(Preview::Failed)) => {
            text(format!("{} image unavailable. Refresh to try again.", view.layer.label())).into()
        }
        (Some(_), Some(Preview::Ready(handle))) => image(handle.clone())
            .width(Length::Fixed(VIEWER_WIDTH * view.zoom.scale()))
            .content_fit(ContentFit::Contain)
            .into(),
    };

    let pane = scrollable(content).direction(Direction::Both {
        vertical: Scrollbar::default(),
        horizontal: Scrollbar::default(),
    });

    container(pane)
        .width(Length::Fixed(VIEWER_WIDTH))
        .height(Length::Fixed(VIEWER_HEIGHT))
        .style(container::rounded_box)
        .into()
}

fn record_details(selected: Option<&NdviRecord>) -> Element<'_, Message> {
    let Some(record) = selected else {
        return column![].into();
    };

    let mut details = column![text(record.date_label()).size(18)].spacing(6);
    match record.stats {
        Some(stats) => {
            details = details
                .push(text(format!("Min NDVI: {:.3}", stats.min())))
                .push(text(format!("Max NDVI: {:.3}", stats.max())))
                .push(text(format!("Mean NDVI: {:.3}", stats.mean())));
        }
        None => details = details.push(text("Statistics unavailable for this image")),
    }

    let health = record.health;
    details
        .push(text("Vegetation health").size(16))
        .push(text(format!("Healthy: {:.1}%", health.healthy_pct)))
        .push(text(format!("Stressed: {:.1}%", health.stressed_pct)))
        .push(text(format!("Unhealthy: {:.1}%", health.unhealthy_pct)))
        .into()
}

fn thumbnail_strip<'a>(view: &'a ProjectView, results: &'a ResultIndex) -> Element<'a, Message> {
    let selected = results.selected_position();
    let spacing = ThumbnailStrip::SLOT_WIDTH - THUMB_SIZE;

    let thumbs = results.as_slice().iter().enumerate().map(|(i, record)| -> Element<'a, Message> {
        let face: Element<Message> = match view.thumbnails.get(&record.id) {
            Some(Thumb::Ready(handle)) => image(handle.clone())
                .width(Length::Fixed(THUMB_SIZE))
                .height(Length::Fixed(THUMB_SIZE * 0.75))
                .content_fit(ContentFit::Cover)
                .into(),
            _ => container(text(record.short_date_label()).size(12))
                .center_x(Length::Fixed(THUMB_SIZE))
                .center_y(Length::Fixed(THUMB_SIZE * 0.75))
                .into(),
        };
        let style = if Some(i) == selected {
            button::primary
        } else {
            button::secondary
        };
        button(face)
            .on_press(Message::SelectImage(i))
            .padding(0)
            .width(Length::Fixed(THUMB_SIZE))
            .style(style)
            .into()
    });

    let strip = scrollable(Row::with_children(thumbs).spacing(spacing).padding([4, 0]))
        .id(app::strip_id())
        .direction(Direction::Horizontal(Scrollbar::default()))
        .on_scroll(Message::StripScrolled)
        .width(Length::Fill);

    row![
        button("‹").on_press(Message::ScrollStripLeft).padding(8),
        strip,
        button("›").on_press(Message::ScrollStripRight).padding(8),
    ]
    .spacing(8)
    .align_y(Alignment::Center)
    .into()
}

/// Text placed at a pixel position over the chart raster
fn overlay_label<'a>(content: impl text::IntoFragment<'a>, x: f32, y: f32) -> Element<'a, Message> {
    container(text(content).size(11).color(Color::from_rgb8(0x44, 0x44, 0x44)))
        .padding(Padding {
            top: y.max(0.0),
            right: 0.0,
            bottom: 0.0,
            left: x.max(0.0),
        })
        .into()
}

fn trend_chart(chart: &ChartCache) -> Element<'_, Message> {
    let (Some(geometry), Some(handle)) = (chart.geometry(), chart.handle()) else {
        return text("No statistics available to chart.").into();
    };
    let (width, height) = (geometry.width as f32, geometry.height as f32);

    let mut layers: Vec<Element<Message>> = vec![image(handle.clone())
        .width(Length::Fixed(width))
        .height(Length::Fixed(height))
        .into()];

    for point in &geometry.points {
        layers.push(overlay_label(point.label.as_str(), point.x - 14.0, geometry.baseline() + 6.0));
    }
    for (y, value) in &geometry.y_ticks {
        layers.push(overlay_label(value.as_str(), 2.0, y - 7.0));
    }
    for entry in &geometry.legend {
        layers.push(overlay_label(entry.series.label(), entry.x + 25.0, entry.y - 7.0));
    }
    layers.push(overlay_label("Time", width / 2.0 - 12.0, height - 16.0));
    layers.push(overlay_label("NDVI Value", PADDING, 8.0));

    container(Stack::with_children(layers))
        .width(Length::Fixed(width))
        .height(Length::Fixed(height))
        .into()
}
