//! Overlay synchronization: keep a read-only annotation layer the same size
//! and scroll offset as its editable control, and mirror its text.

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::annotate::{annotate, FeedbackFragment};
use crate::sanitize::escape;

/// Height style of an editable control.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ControlHeight {
    /// Let layout decide; the control's scroll height is then its natural
    /// content height.
    Auto,
    Px(u32),
}

/// The plain-text editable control the user types into.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EditableControl {
    pub value: String,
    pub height: ControlHeight,
    pub scroll_top: u32,
}

impl EditableControl {
    pub fn new() -> Self {
        EditableControl {
            value: String::new(),
            height: ControlHeight::Auto,
            scroll_top: 0,
        }
    }

    pub fn height_px(&self) -> Option<u32> {
        match self.height {
            ControlHeight::Auto => None,
            ControlHeight::Px(px) => Some(px),
        }
    }
}

impl Default for EditableControl {
    fn default() -> Self {
        Self::new()
    }
}

/// The annotation layer rendered behind the editable control.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OverlayLayer {
    pub markup: String,
    pub height: u32,
    pub scroll_top: u32,
}

/// What the overlay currently shows.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum OverlayMode {
    /// `escape(text)`, nothing highlighted.
    #[default]
    Mirror,
    /// Text annotated with the fragments of the latest evaluation.
    Annotated(Vec<FeedbackFragment>),
}

impl OverlayMode {
    pub fn fragments(&self) -> &[FeedbackFragment] {
        match self {
            OverlayMode::Mirror => &[],
            OverlayMode::Annotated(fragments) => fragments,
        }
    }

    /// Markup for `text` in this mode.
    pub fn render(&self, text: &str) -> String {
        match self {
            OverlayMode::Mirror => escape(text),
            OverlayMode::Annotated(fragments) => annotate(text, fragments),
        }
    }
}

/// Layout measurement: the natural content height of a control whose height
/// has been reset to [`ControlHeight::Auto`].
pub trait ContentMeasure {
    fn scroll_height(&self, control: &EditableControl) -> u32;
}

/// Fixed-pitch layout: every character is one column wide and long lines
/// soft-wrap at `columns`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MonospaceMeasure {
    pub columns: usize,
    pub line_height: u32,
    pub padding: u32,
}

impl Default for MonospaceMeasure {
    fn default() -> Self {
        MonospaceMeasure {
            columns: 80,
            line_height: 20,
            padding: 8,
        }
    }
}

impl MonospaceMeasure {
    pub fn visual_lines(&self, text: &str) -> u32 {
        let columns = self.columns.max(1);
        text.split('\n')
            .map(|line| {
                let chars = line.chars().count();
                chars.div_ceil(columns).max(1) as u32
            })
            .sum()
    }
}

impl ContentMeasure for MonospaceMeasure {
    fn scroll_height(&self, control: &EditableControl) -> u32 {
        self.visual_lines(&control.value) * self.line_height + 2 * self.padding
    }
}

/// Run one input-event synchronization pass.
///
/// Resets the control to automatic height, reads its natural scroll height,
/// applies that height to both layers and re-renders the overlay from the
/// control's current text. A control without an overlay only gets resized.
/// Returns the applied height.
pub fn sync_input(
    control: &mut EditableControl,
    overlay: Option<&mut OverlayLayer>,
    mode: &OverlayMode,
    measure: &dyn ContentMeasure,
) -> u32 {
    control.height = ControlHeight::Auto;
    let height = measure.scroll_height(control);
    control.height = ControlHeight::Px(height);

    if let Some(overlay) = overlay {
        overlay.height = height;
        overlay.markup = mode.render(&control.value);
        overlay.scroll_top = control.scroll_top;
    }
    debug!(height, chars = control.value.len(), "overlay synced");
    height
}

/// Mirror the control's scroll offset into its overlay.
pub fn sync_scroll(control: &EditableControl, overlay: Option<&mut OverlayLayer>) {
    if let Some(overlay) = overlay {
        overlay.scroll_top = control.scroll_top;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn measure() -> MonospaceMeasure {
        MonospaceMeasure {
            columns: 10,
            line_height: 20,
            padding: 4,
        }
    }

    #[test]
    fn test_visual_lines_wraps() {
        let m = measure();
        assert_eq!(m.visual_lines(""), 1);
        assert_eq!(m.visual_lines("0123456789"), 1);
        assert_eq!(m.visual_lines("0123456789a"), 2);
        assert_eq!(m.visual_lines("a\n\nb"), 3);
    }

    #[test]
    fn test_sync_sets_equal_heights() {
        let mut control = EditableControl::new();
        control.value = "line one\nline two is long".into();
        let mut overlay = OverlayLayer::default();
        let h = sync_input(&mut control, Some(&mut overlay), &OverlayMode::Mirror, &measure());
        // 1 + 2 visual lines
        assert_eq!(h, 3 * 20 + 8);
        assert_eq!(control.height, ControlHeight::Px(h));
        assert_eq!(overlay.height, h);
    }

    #[test]
    fn test_sync_shrinks_after_delete() {
        let mut control = EditableControl::new();
        let mut overlay = OverlayLayer::default();
        control.value = "a\nb\nc\nd".into();
        let tall = sync_input(&mut control, Some(&mut overlay), &OverlayMode::Mirror, &measure());
        control.value = "a".into();
        let short = sync_input(&mut control, Some(&mut overlay), &OverlayMode::Mirror, &measure());
        assert!(short < tall);
        assert_eq!(overlay.height, short);
    }

    #[test]
    fn test_sync_mirror_escapes() {
        let mut control = EditableControl::new();
        control.value = "<b>bold</b> & more".into();
        let mut overlay = OverlayLayer::default();
        sync_input(&mut control, Some(&mut overlay), &OverlayMode::Mirror, &measure());
        assert_eq!(overlay.markup, escape(&control.value));
    }

    #[test]
    fn test_sync_annotated_reapplies_fragments() {
        let mut control = EditableControl::new();
        control.value = "a good point".into();
        let mut overlay = OverlayLayer::default();
        let mode = OverlayMode::Annotated(vec![FeedbackFragment::new(0, "good", "")]);
        sync_input(&mut control, Some(&mut overlay), &mode, &measure());
        assert!(overlay.markup.contains(">good</span>"));
    }

    #[test]
    fn test_sync_without_overlay_only_resizes() {
        let mut control = EditableControl::new();
        control.value = "text".into();
        let h = sync_input(&mut control, None, &OverlayMode::Mirror, &measure());
        assert_eq!(control.height_px(), Some(h));
    }

    #[test]
    fn test_sync_scroll_mirrors_offset() {
        let mut control = EditableControl::new();
        control.scroll_top = 42;
        let mut overlay = OverlayLayer::default();
        sync_scroll(&control, Some(&mut overlay));
        assert_eq!(overlay.scroll_top, 42);
        sync_scroll(&control, None);
    }
}
