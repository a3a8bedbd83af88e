/// Timeline navigation over the result index
///
/// Selection moves cyclically. The thumbnail strip keeps its own scroll
/// offset: scrolling never touches the selection, and a selection change
/// only asks the strip to bring the selected thumbnail into view.
use super::results::ResultIndex;

/// Pixels moved by one click on a strip arrow
pub const SCROLL_STEP: f32 = 200.0;

/// Move to the next record, wrapping from the last to the first
pub fn next(index: &mut ResultIndex) {
    let len = index.len();
    if len == 0 {
        return;
    }
    let position = index.selected_position().map_or(0, |p| (p + 1) % len);
    index.set_selected(Some(position));
}

/// Move to the previous record, wrapping from the first to the last
pub fn previous(index: &mut ResultIndex) {
    let len = index.len();
    if len == 0 {
        return;
    }
    let position = index
        .selected_position()
        .map_or(0, |p| if p == 0 { len - 1 } else { p - 1 });
    index.set_selected(Some(position));
}

/// Select `position`; returns false (and changes nothing) when out of range
pub fn select(index: &mut ResultIndex, position: usize) -> bool {
    if position < index.len() {
        index.set_selected(Some(position));
        true
    } else {
        false
    }
}

/// Header label for the viewer
pub fn position_label(index: &ResultIndex) -> String {
    match index.selected_position() {
        Some(p) if !index.is_empty() => format!("Image {} of {}", p + 1, index.len()),
        _ => "No image selected".to_string(),
    }
}

/// Scroll state of the horizontal thumbnail strip
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct ThumbnailStrip {
    offset: f32,
    viewport: f32,
    content: f32,
}

impl ThumbnailStrip {
    /// Width of one thumbnail slot including spacing
    pub const SLOT_WIDTH: f32 = 136.0;

    pub fn offset(&self) -> f32 {
        self.offset
    }

    fn max_offset(&self) -> f32 {
        (self.content - self.viewport).max(0.0)
    }

    /// Record the strip's geometry as reported by the scrollable
    pub fn on_scrolled(&mut self, offset: f32, viewport: f32, content: f32) {
        self.viewport = viewport.max(0.0);
        self.content = content.max(0.0);
        self.offset = offset.clamp(0.0, self.max_offset());
    }

    pub fn scroll_left(&mut self) -> f32 {
        self.offset = (self.offset - SCROLL_STEP).max(0.0);
        self.offset
    }

    pub fn scroll_right(&mut self) -> f32 {
        self.offset = (self.offset + SCROLL_STEP).min(self.max_offset());
        self.offset
    }

    /// Offset that brings slot `position` into view, if it is not already
    pub fn ensure_visible(&mut self, position: usize) -> Option<f32> {
        if self.viewport <= 0.0 {
            return None;
        }
        let start = position as f32 * Self::SLOT_WIDTH;
        let end = start + Self::SLOT_WIDTH;

        let target = if start < self.offset {
            start
        } else if end > self.offset + self.viewport {
            end - self.viewport
        } else {
            return None;
        };

        self.offset = target.clamp(0.0, self.max_offset());
        Some(self.offset)
    }
}
