/// AI insight panel
use iced::widget::{button, column, container, text};
use iced::{Element, Length};

use crate::app::Message;
use crate::state::insights::{InsightPanel, NO_INSIGHTS};

pub fn view(panel: &InsightPanel) -> Element<'_, Message> {
    let body = if panel.is_loading() {
        text("Loading insights...")
    } else {
        text(panel.text().unwrap_or(NO_INSIGHTS))
    };

    let refresh = button("Refresh").padding(8);
    let refresh = if panel.is_loading() {
        refresh
    } else {
        refresh.on_press(Message::RefreshInsights)
    };

    column![
        text("Recommendation").size(20),
        container(body.size(15))
            .padding(16)
            .width(Length::Fill)
            .style(container::rounded_box),
        refresh,
    ]
    .spacing(12)
    .into()
}
