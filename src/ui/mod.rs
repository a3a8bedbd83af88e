/// User interface module
///
/// View functions only read application state and emit messages:
/// - Sidebar and screen layout (this file)
/// - Project list and creation form (projects.rs)
/// - Image viewer, thumbnail strip and trend chart (viewer.rs, chart.rs)
/// - Upload area (upload.rs)
/// - AI insight panel (insights.rs)
use iced::widget::{button, column, container, horizontal_rule, row, text, Column};
use iced::{Alignment, Element, Length};

use crate::app::{FieldMonitor, Message, Screen, Tab};

pub mod chart;
pub mod insights;
pub mod projects;
pub mod upload;
pub mod viewer;

const SIDEBAR_WIDTH: f32 = 200.0;

/// Root layout: optional sidebar next to the active screen
pub fn layout(app: &FieldMonitor) -> Element<'_, Message> {
    let content = match app.screen {
        Screen::Projects => projects::list(app),
        Screen::NewProject => projects::form(&app.form),
        Screen::Project => project_screen(app),
    };

    let toggle = button(text(if app.sidebar_open { "◀" } else { "☰" }))
        .on_press(Message::ToggleSidebar)
        .padding(8);

    let main = column![toggle, content].spacing(10).padding(20);

    if app.sidebar_open {
        row![sidebar(app.screen), main].into()
    } else {
        main.into()
    }
}

fn sidebar(screen: Screen) -> Element<'static, Message> {
    let entry = |label: &'static str, target: Screen, message: Message| {
        let b = button(text(label)).width(Length::Fill).padding(10);
        if screen == target {
            b.style(button::primary)
        } else {
            b.style(button::text).on_press(message)
        }
    };

    let nav: Column<Message> = column![
        text("Field Monitor").size(22),
        horizontal_rule(1),
        entry("Projects", Screen::Projects, Message::ShowProjects),
        entry("New Project", Screen::NewProject, Message::ShowNewProject),
    ]
    .spacing(12)
    .padding(16);

    container(nav)
        .width(Length::Fixed(SIDEBAR_WIDTH))
        .height(Length::Fill)
        .style(container::rounded_box)
        .into()
}

fn project_screen(app: &FieldMonitor) -> Element<'_, Message> {
    let Some(view) = app.view.as_ref() else {
        return text("No project selected").into();
    };

    let tab = |label: &'static str, target: Tab| {
        let b = button(text(label)).padding([6, 14]);
        if view.tab == target {
            b.style(button::primary)
        } else {
            b.style(button::secondary).on_press(Message::SelectTab(target))
        }
    };

    let header = column![
        text(&view.project.name).size(28),
        text(view.project.location.as_deref().unwrap_or("Unknown location")).size(14),
    ]
    .spacing(4);

    let tabs = row![
        tab("Visualization", Tab::Visualization),
        tab("AI Insights", Tab::Insights),
        tab("Add Images", Tab::AddImages),
    ]
    .spacing(8)
    .align_y(Alignment::Center);

    let body = match view.tab {
        Tab::Visualization => viewer::view(view, &app.results, &app.chart),
        Tab::Insights => insights::view(&app.insights),
        Tab::AddImages => upload::view(view),
    };

    let mut page = column![header, tabs].spacing(16);
    if let Some(status) = &view.status {
        page = page.push(text(status).size(14));
    }
    page.push(body).into()
}
