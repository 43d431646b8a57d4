//! # answer-overlay
//!
//! Feedback highlighting for long-form answers. An editable answer is paired
//! with a read-only overlay that mirrors its text, size and scroll offset;
//! feedback fragments from an evaluation service are painted into that
//! overlay as colored spans, a completeness bar only ever ratchets upward,
//! and chat replies are routed to the transcript or to per-question feedback
//! panels.
//!
//! The DOM is modelled as plain view-state structs owned by a
//! [`workspace::Workspace`]; a real renderer plugs in through
//! [`overlay::ContentMeasure`].

pub mod annotate;
pub mod backend;
pub mod cli;
pub mod config;
pub mod error;
pub mod overlay;
pub mod palette;
pub mod panel;
pub mod router;
pub mod sanitize;
pub mod score;
pub mod terminal;
pub mod web;
pub mod workspace;

#[cfg(all(feature = "wasm", target_arch = "wasm32"))]
pub mod wasm;

pub use annotate::{annotate, FeedbackFragment};
pub use error::{BackendError, OverlayError};
pub use palette::{color_for_index, color_for_score};
pub use sanitize::escape;
pub use workspace::{FieldSpec, Workspace};
