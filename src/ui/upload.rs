/// Upload area: drop zone, staged queue, progress and actions
///
/// Every enabled/disabled decision comes from `UploadSession::controls`.
use iced::widget::{button, column, container, progress_bar, row, scrollable, text, Column};
use iced::{Alignment, Element, Length};

use crate::app::{Message, ProjectView};
use crate::state::session::ProgressDisplay;
use crate::state::transfer::TransferPhase;

/// Attach `message` only when `enabled`
fn action<'a>(label: &'a str, message: Message, enabled: bool) -> button::Button<'a, Message> {
    let b = button(text(label)).padding([8, 16]);
    if enabled {
        b.on_press(message)
    } else {
        b
    }
}

pub fn view(view: &ProjectView) -> Element<'_, Message> {
    let session = &view.upload;
    let controls = session.controls();
    let intake = session.intake();

    let drop_zone = container(
        column![
            text("Drag and drop imagery here").size(18),
            text(format!("Accepted formats: {}", intake.policy().describe())).size(12),
            action("Browse Files", Message::BrowseFiles, controls.can_browse),
        ]
        .spacing(10)
        .align_x(Alignment::Center),
    )
    .padding(30)
    .center_x(Length::Fill)
    .style(container::rounded_box);

    let mut queue: Column<Message> = column![].spacing(6);
    for (i, file) in intake.files().iter().enumerate() {
        queue = queue.push(
            row![
                text(&file.name).width(Length::Fill),
                text(file.size_label()).size(12),
                action("Remove", Message::RemoveFile(i), controls.can_remove),
            ]
            .spacing(10)
            .align_y(Alignment::Center),
        );
    }

    let summary = if intake.is_empty() {
        "No files selected".to_string()
    } else {
        format!(
            "{} file(s), {:.2} MB",
            intake.len(),
            intake.total_bytes() as f64 / 1024.0 / 1024.0
        )
    };

    let mut page = column![drop_zone, text(summary).size(14)].spacing(14);
    if !intake.is_empty() {
        page = page.push(scrollable(queue).height(Length::Fixed(180.0)));
    }

    match controls.progress {
        ProgressDisplay::Determinate(percent) => {
            page = page
                .push(progress_bar(0.0..=100.0, percent).height(Length::Fixed(10.0)))
                .push(text(format!("Uploading... {percent:.0}%")).size(14));
        }
        ProgressDisplay::Indeterminate => {
            let dots = ".".repeat(view.processing_ticks % 4);
            page = page.push(text(format!("Processing NDVI on the server{dots}")).size(14));
        }
        ProgressDisplay::Hidden => {}
    }

    if session.phase() == TransferPhase::Complete {
        page = page.push(text(format!(
            "Upload complete. {} result(s) added to the timeline.",
            session.transfer().outcomes().len()
        )));
    }
    if let Some(error) = session.error_message() {
        page = page.push(text(error).size(14));
    }

    let submit_label = if session.phase() == TransferPhase::Failed {
        "Upload Again"
    } else {
        "Upload & Process"
    };
    let actions = row![
        action(submit_label, Message::SubmitUpload, controls.can_submit),
        action("Clear", Message::ClearFiles, controls.can_clear),
        action("Retry", Message::RetryUpload, controls.can_retry),
    ]
    .spacing(10);

    page.push(actions).into()
}
