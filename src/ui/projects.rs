/// Project list and "New Project" form
use iced::widget::{button, column, container, row, text, text_input, Column};
use iced::{Alignment, Element, Length};
use iced_aw::Wrap;

use crate::api::models::ProjectSummary;
use crate::app::{FieldMonitor, Message};
use crate::state::projects::{filter_projects, NewProjectForm};

const CARD_WIDTH: f32 = 260.0;

pub fn list(app: &FieldMonitor) -> Element<'_, Message> {
    let header = row![
        text("Projects").size(28).width(Length::Fill),
        button("Refresh").on_press(Message::RefreshProjects).padding(8),
        button("New Project").on_press(Message::ShowNewProject).padding(8),
    ]
    .spacing(10)
    .align_y(Alignment::Center);

    let search = text_input("Search by name or status...", &app.search)
        .on_input(Message::SearchChanged)
        .padding(8);

    let visible = filter_projects(&app.projects, &app.search);

    let body: Element<Message> = if app.projects_loading && app.projects.is_empty() {
        text("Loading projects...").into()
    } else if let Some(error) = &app.projects_error {
        text(error).into()
    } else if visible.is_empty() {
        text("No projects found.").into()
    } else {
        Wrap::with_elements(visible.into_iter().map(card).collect())
            .spacing(16.0)
            .line_spacing(16.0)
            .into()
    };

    column![header, search, body].spacing(16).into()
}

fn card(project: &ProjectSummary) -> Element<'_, Message> {
    let mut details = column![
        text(&project.name).size(18),
        text(format!("Status: {}", project.status())).size(12),
    ]
    .spacing(6);

    if let Some(location) = &project.location {
        details = details.push(text(location).size(12));
    }
    if let Some(created) = project.created_label() {
        details = details.push(text(format!("Created {created}")).size(12));
    }
    if let Some(description) = project.description.as_deref().filter(|d| !d.is_empty()) {
        details = details.push(text(description).size(12));
    }

    button(container(details).width(Length::Fill).padding(12))
        .on_press(Message::OpenProject(project.clone()))
        .width(Length::Fixed(CARD_WIDTH))
        .style(button::secondary)
        .into()
}

fn labeled_input<'a>(
    label: &'a str,
    placeholder: &'a str,
    value: &'a str,
    on_input: Option<fn(String) -> Message>,
) -> Column<'a, Message> {
    let input = text_input(placeholder, value).padding(8);
    let input = match on_input {
        Some(on_input) => input.on_input(on_input),
        None => input,
    };
    column![text(label).size(14), input].spacing(4)
}

pub fn form(form: &NewProjectForm) -> Element<'_, Message> {
    // Inputs are read-only while the request is in flight
    let editable = |on_input: fn(String) -> Message| (!form.submitting).then_some(on_input);

    let submit = button(if form.submitting { "Creating..." } else { "Create Project" }).padding(10);
    let submit = if form.submitting {
        submit
    } else {
        submit.on_press(Message::SubmitProject)
    };

    let mut content = column![
        text("New Project").size(28),
        labeled_input("Name", "North orchard", &form.name, editable(Message::FormName)),
        labeled_input(
            "Location",
            "Town, region or address",
            &form.location,
            editable(Message::FormLocation)
        ),
        labeled_input(
            "Description",
            "Optional notes",
            &form.description,
            editable(Message::FormDescription)
        ),
        submit,
    ]
    .spacing(14)
    .max_width(480.0);

    if let Some(error) = &form.error {
        content = content.push(text(error).size(14));
    }

    content.into()
}
