//! Completeness progress indicator and the score ratchet.
//!
//! The displayed score is read back from the indicator's rendered geometry
//! (bar width over container width), never from a separately stored number.
//! Automatic updates may only raise it; `force_complete` and `reset` are the
//! explicit overrides.

use tracing::debug;

use crate::palette::{color_for_score, Rgb, HIGH_SCORE, LOW_SCORE};

#[derive(Debug, Clone, PartialEq)]
pub struct ProgressIndicator {
    /// Rendered width of the container, in pixels.
    pub container_width: f64,
    /// Bar width as a percentage of the container.
    pub width_percent: f64,
    pub color: Rgb,
}

impl ProgressIndicator {
    pub fn new(container_width: f64) -> Self {
        ProgressIndicator {
            container_width,
            width_percent: 0.0,
            color: LOW_SCORE,
        }
    }

    pub fn rendered_width(&self) -> f64 {
        self.container_width * self.width_percent / 100.0
    }

    /// Score currently shown, derived from geometry. A collapsed container
    /// has no geometry to read, so the stored bar proportion stands in.
    pub fn displayed_score(&self) -> f64 {
        if self.container_width <= 0.0 {
            return self.width_percent / 100.0;
        }
        self.rendered_width() / self.container_width
    }

    /// Container resizes keep the bar proportion.
    pub fn resize(&mut self, container_width: f64) {
        self.container_width = container_width.max(0.0);
    }

    /// Apply `new_score` only if it beats what is displayed. Returns whether
    /// the indicator changed.
    pub fn reconcile(&mut self, new_score: f64) -> bool {
        if new_score.is_nan() {
            return false;
        }
        let new_score = new_score.clamp(0.0, 1.0);
        let current = self.displayed_score();
        if new_score > current {
            self.width_percent = new_score * 100.0;
            self.color = color_for_score(new_score);
            debug!(from = current, to = new_score, "score raised");
            true
        } else {
            debug!(current, offered = new_score, "score not raised");
            false
        }
    }

    /// Fill the bar regardless of its prior value.
    pub fn force_complete(&mut self) {
        self.width_percent = 100.0;
        self.color = HIGH_SCORE;
    }

    /// Programmatic reset back to an empty bar.
    pub fn reset(&mut self) {
        self.width_percent = 0.0;
        self.color = LOW_SCORE;
    }
}
