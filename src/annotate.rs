//! Span annotation: wrap every case-insensitive occurrence of each feedback
//! fragment in a colored span.
//!
//! Fragments are applied in order. Text already claimed by an earlier
//! fragment is never re-matched, so the first-applied fragment wins any
//! overlapping region. Fragment text is always matched literally; pattern
//! metacharacters in a fragment carry no meaning.

use regex::{Regex, RegexBuilder};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::palette::color_for_index;
use crate::sanitize::escape;

/// A snippet of answer text the feedback service tied to one feedback message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeedbackFragment {
    /// Ordinal within its evaluation; picks the highlight color.
    pub index: usize,
    /// Literal text to locate in the answer.
    pub text: String,
    /// Feedback message this fragment belongs to.
    #[serde(default)]
    pub message: String,
}

impl FeedbackFragment {
    pub fn new(index: usize, text: impl Into<String>, message: impl Into<String>) -> Self {
        FeedbackFragment {
            index,
            text: text.into(),
            message: message.into(),
        }
    }
}

/// A run of raw (unescaped) answer text, either plain or claimed by a fragment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Segment {
    Plain(String),
    Marked { index: usize, text: String },
}

impl Segment {
    pub fn text(&self) -> &str {
        match self {
            Segment::Plain(t) => t,
            Segment::Marked { text, .. } => text,
        }
    }
}

/// Split `raw` into plain and highlighted runs.
///
/// Concatenating the segment texts always reproduces `raw` exactly.
pub fn annotate_segments(raw: &str, fragments: &[FeedbackFragment]) -> Vec<Segment> {
    let mut segments = vec![Segment::Plain(raw.to_string())];
    for fragment in fragments {
        let Some(pattern) = literal_pattern(&fragment.text) else {
            continue;
        };
        let mut hits = 0usize;
        segments = segments
            .into_iter()
            .flat_map(|segment| match segment {
                Segment::Plain(text) => {
                    let split = split_matches(&pattern, text, fragment.index);
                    hits += split
                        .iter()
                        .filter(|s| matches!(s, Segment::Marked { .. }))
                        .count();
                    split
                }
                marked => vec![marked],
            })
            .collect();
        debug!(fragment = fragment.index, hits, "fragment applied");
    }
    segments
}

/// Render segments as overlay markup. Every text run is escaped exactly once.
pub fn render_markup(segments: &[Segment]) -> String {
    let mut out = String::new();
    for segment in segments {
        match segment {
            Segment::Plain(text) => out.push_str(&escape(text)),
            Segment::Marked { index, text } => {
                out.push_str(&format!(
                    r#"<span class="fragment-highlight" data-fragment="{}" style="background-color: {}">{}</span>"#,
                    index,
                    color_for_index(*index).to_hex(),
                    escape(text),
                ));
            }
        }
    }
    out
}

/// Escape `raw` and wrap each fragment occurrence in a colored span.
pub fn annotate(raw: &str, fragments: &[FeedbackFragment]) -> String {
    render_markup(&annotate_segments(raw, fragments))
}

fn literal_pattern(text: &str) -> Option<Regex> {
    if text.trim().is_empty() {
        return None;
    }
    match RegexBuilder::new(&regex::escape(text))
        .case_insensitive(true)
        .build()
    {
        Ok(pattern) => Some(pattern),
        Err(e) => {
            warn!(error = %e, "fragment could not be compiled, skipping");
            None
        }
    }
}

fn split_matches(pattern: &Regex, text: String, index: usize) -> Vec<Segment> {
    let mut out = Vec::new();
    let mut last = 0;
    for m in pattern.find_iter(&text) {
        if m.start() > last {
            out.push(Segment::Plain(text[last..m.start()].to_string()));
        }
        out.push(Segment::Marked {
            index,
            text: m.as_str().to_string(),
        });
        last = m.end();
    }
    if last == 0 {
        return vec![Segment::Plain(text)];
    }
    if last < text.len() {
        out.push(Segment::Plain(text[last..].to_string()));
    }
    out
}
