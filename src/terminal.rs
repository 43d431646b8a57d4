//! Terminal rendering of workspace state with `colored`.

use colored::*;

use crate::annotate::Segment;
use crate::palette::{color_for_index, Rgb};
use crate::panel::{ChatTranscript, FeedbackPanel, TranscriptEntry};
use crate::score::ProgressIndicator;
use crate::workspace::AnswerField;

fn on(text: &str, color: Rgb) -> ColoredString {
    text.black().on_truecolor(color.r, color.g, color.b)
}

/// The answer text with highlighted fragments.
pub fn render_segments(segments: &[Segment]) -> String {
    segments
        .iter()
        .map(|segment| match segment {
            Segment::Plain(text) => text.normal().to_string(),
            Segment::Marked { index, text } => on(text, color_for_index(*index)).to_string(),
        })
        .collect()
}

/// A fixed-width bar in the indicator's color, e.g. `[██████      ] 50%`.
pub fn render_progress(progress: &ProgressIndicator, width: usize) -> String {
    let score = progress.displayed_score().clamp(0.0, 1.0);
    let filled = ((score * width as f64).round() as usize).min(width);
    let bar = "█".repeat(filled);
    let c = progress.color;
    format!(
        "[{}{}] {:>3}%",
        bar.truecolor(c.r, c.g, c.b),
        " ".repeat(width - filled),
        (score * 100.0).round() as u32
    )
}

pub fn render_panel(panel: &FeedbackPanel) -> String {
    let mut out = String::new();
    if panel.loading {
        out.push_str(&format!("  {}\n", "… waiting for feedback".dimmed()));
    }
    if let Some(notice) = &panel.notice {
        out.push_str(&format!("  {}\n", notice.bright_red()));
    }
    for (i, item) in panel.items.iter().enumerate() {
        out.push_str(&format!("  {} {}\n", on(&format!(" {} ", i + 1), item.color), item.label));
    }
    out
}

pub fn render_transcript(transcript: &ChatTranscript) -> String {
    let mut out = String::new();
    for entry in &transcript.entries {
        match entry {
            TranscriptEntry::Message(m) => {
                out.push_str(&format!("{} {}\n", format!("{}:", m.role).bright_cyan(), m.content));
            }
            TranscriptEntry::Exchange { sent, response } => {
                out.push_str(&format!("{} {}\n", "You:".bright_blue(), sent));
                out.push_str(&format!("{} {}\n", "Agent:".bright_magenta(), response));
            }
        }
    }
    if transcript.loading {
        out.push_str(&format!("{}\n", "…".dimmed()));
    }
    out
}

/// Header, highlighted answer, progress bar and feedback items of one field.
pub fn render_field(field: &AnswerField, bar_width: usize) -> String {
    let mut out = format!(
        "{} {}\n",
        format!("[{}]", field.id).bold(),
        render_progress(&field.progress, bar_width)
    );
    let text = render_segments(&field.segments());
    if !text.is_empty() {
        out.push_str(&text);
        out.push('\n');
    }
    out.push_str(&render_panel(&field.panel));
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn plain() {
        colored::control::set_override(false);
    }

    #[test]
    fn test_render_segments_plain_text_preserved() {
        plain();
        let segments = vec![
            Segment::Plain("The ".into()),
            Segment::Marked {
                index: 0,
                text: "cat".into(),
            },
            Segment::Plain(" sat".into()),
        ];
        assert_eq!(render_segments(&segments), "The cat sat");
    }

    #[test]
    fn test_render_progress_half() {
        plain();
        let mut p = ProgressIndicator::new(100.0);
        p.reconcile(0.5);
        assert_eq!(render_progress(&p, 10), format!("[{}{}]  50%", "█".repeat(5), " ".repeat(5)));
    }

    #[test]
    fn test_render_progress_empty_and_full() {
        plain();
        let mut p = ProgressIndicator::new(100.0);
        assert!(render_progress(&p, 4).ends_with("  0%"));
        p.force_complete();
        assert!(render_progress(&p, 4).ends_with("100%"));
    }

    #[test]
    fn test_render_panel_numbers_items() {
        plain();
        let mut panel = FeedbackPanel::default();
        panel.render("q1", &["first".into(), "second".into()]);
        let out = render_panel(&panel);
        assert!(out.contains(" 1  first"));
        assert!(out.contains(" 2  second"));
    }

    #[test]
    fn test_render_transcript_exchange() {
        plain();
        let mut t = ChatTranscript::default();
        t.push_exchange("hello", "Hello! How can I assist you today?");
        let out = render_transcript(&t);
        assert!(out.contains("You: hello"));
        assert!(out.contains("Agent: Hello!"));
    }
}
