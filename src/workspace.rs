//! The answer workspace: a registry of answer fields and the controller
//! operations that tie the overlay, score, panel and chat pieces to the
//! backend.
//!
//! ## Evaluation flow
//! 1. `evaluate` marks the panel as loading and builds one request.
//! 2. Feedback and score requests run concurrently; whichever resolves first
//!    is applied first.
//! 3. Feedback replaces the panel and the overlay highlights wholesale.
//! 4. Score goes through the ratchet, so arrival order never lowers the bar.
//!
//! Callers that drive requests themselves (e.g. from a UI event loop) can use
//! [`Workspace::evaluation_request`] with [`Workspace::apply_feedback`] and
//! [`Workspace::apply_score`] directly.

use std::collections::HashMap;

use futures_util::future::{FutureExt, LocalBoxFuture};
use futures_util::stream::{FuturesUnordered, StreamExt};
use tracing::{debug, info, warn};

use crate::annotate::{annotate_segments, Segment};
use crate::backend::{
    Answers, Backend, ChatRequest, EvaluationRequest, FeedbackResponse, SaveOutcome, SeedRequest,
};
use crate::config::OverlayConfig;
use crate::error::{BackendError, OverlayError};
use crate::overlay::{
    sync_input, sync_scroll, ContentMeasure, EditableControl, OverlayLayer, OverlayMode,
};
use crate::panel::{ChatMessage, ChatTranscript, FeedbackPanel, ItemEvent, FEEDBACK_FALLBACK};
use crate::router::{dispatch, DispatchReport, DispatchSink, TargetList};
use crate::score::ProgressIndicator;

/// Role label used for locally generated transcript lines.
pub const SYSTEM_ROLE: &str = "System";

/// Everything needed to register one answer field.
#[derive(Debug, Clone, PartialEq)]
pub struct FieldSpec {
    pub id: String,
    pub context: String,
    /// Whether the field gets an annotation overlay.
    pub overlay: bool,
    pub progress_width: f64,
}

impl FieldSpec {
    pub fn new(id: impl Into<String>) -> Self {
        FieldSpec {
            id: id.into(),
            context: String::new(),
            overlay: true,
            progress_width: 100.0,
        }
    }

    pub fn context(mut self, context: impl Into<String>) -> Self {
        self.context = context.into();
        self
    }

    pub fn without_overlay(mut self) -> Self {
        self.overlay = false;
        self
    }

    /// Container width for the progress bar; non-positive widths become 1px.
    pub fn progress_width(mut self, width: f64) -> Self {
        self.progress_width = width.max(1.0);
        self
    }
}

/// One question's answer and the view state attached to it at registration.
#[derive(Debug, Clone)]
pub struct AnswerField {
    pub id: String,
    pub context: String,
    pub control: EditableControl,
    pub overlay: Option<OverlayLayer>,
    pub mode: OverlayMode,
    pub progress: ProgressIndicator,
    pub panel: FeedbackPanel,
}

impl AnswerField {
    fn new(spec: FieldSpec) -> Self {
        AnswerField {
            id: spec.id,
            context: spec.context,
            control: EditableControl::new(),
            overlay: spec.overlay.then(OverlayLayer::default),
            mode: OverlayMode::Mirror,
            progress: ProgressIndicator::new(spec.progress_width),
            panel: FeedbackPanel::default(),
        }
    }

    pub fn text(&self) -> &str {
        &self.control.value
    }

    /// The overlay content as plain/highlighted runs of raw text.
    pub fn segments(&self) -> Vec<Segment> {
        annotate_segments(&self.control.value, self.mode.fragments())
    }

    fn rerender_overlay(&mut self) {
        if let Some(overlay) = self.overlay.as_mut() {
            overlay.markup = self.mode.render(&self.control.value);
        }
    }
}

enum EvalReply {
    Feedback(Result<FeedbackResponse, BackendError>),
    Score(Result<f64, BackendError>),
}

/// Owns every [`AnswerField`], the chat transcript and the chat input.
pub struct Workspace {
    fields: Vec<AnswerField>,
    index: HashMap<String, usize>,
    transcript: ChatTranscript,
    chat_input: String,
    measure: Box<dyn ContentMeasure>,
}

impl Workspace {
    pub fn new(measure: impl ContentMeasure + 'static) -> Self {
        Workspace {
            fields: Vec::new(),
            index: HashMap::new(),
            transcript: ChatTranscript::default(),
            chat_input: String::new(),
            measure: Box::new(measure),
        }
    }

    /// Build a workspace with one overlaid field per configured question.
    pub fn from_config(config: &OverlayConfig) -> Result<Self, OverlayError> {
        let mut workspace = Workspace::new(config.layout.measure());
        for q in &config.questions {
            workspace.register(
                FieldSpec::new(q.id.clone())
                    .context(q.context.clone())
                    .progress_width(config.layout.progress_width),
            )?;
        }
        Ok(workspace)
    }

    pub fn register(&mut self, spec: FieldSpec) -> Result<&mut AnswerField, OverlayError> {
        if self.index.contains_key(&spec.id) {
            return Err(OverlayError::DuplicateQuestion(spec.id));
        }
        let id = spec.id.clone();
        let mut field = AnswerField::new(spec);
        sync_input(
            &mut field.control,
            field.overlay.as_mut(),
            &field.mode,
            self.measure.as_ref(),
        );
        let slot = self.fields.len();
        self.index.insert(id, slot);
        self.fields.push(field);
        Ok(&mut self.fields[slot])
    }

    pub fn field(&self, id: &str) -> Option<&AnswerField> {
        self.index.get(id).map(|&i| &self.fields[i])
    }

    fn field_mut(&mut self, id: &str) -> Result<&mut AnswerField, OverlayError> {
        match self.index.get(id) {
            Some(&i) => Ok(&mut self.fields[i]),
            None => Err(OverlayError::UnknownQuestion(id.to_string())),
        }
    }

    /// Fields in registration order.
    pub fn fields(&self) -> impl Iterator<Item = &AnswerField> {
        self.fields.iter()
    }

    pub fn transcript(&self) -> &ChatTranscript {
        &self.transcript
    }

    pub fn chat_input(&self) -> &str {
        &self.chat_input
    }

    pub fn set_chat_input(&mut self, text: impl Into<String>) {
        self.chat_input = text.into();
    }

    /// Handle an input event: store the text and resync the overlay.
    /// Returns the new height of both layers.
    pub fn input(&mut self, id: &str, text: impl Into<String>) -> Result<u32, OverlayError> {
        let measure = self.measure.as_ref();
        let index = *self
            .index
            .get(id)
            .ok_or_else(|| OverlayError::UnknownQuestion(id.to_string()))?;
        let field = &mut self.fields[index];
        field.control.value = text.into();
        Ok(sync_input(
            &mut field.control,
            field.overlay.as_mut(),
            &field.mode,
            measure,
        ))
    }

    pub fn scroll(&mut self, id: &str, scroll_top: u32) -> Result<(), OverlayError> {
        let field = self.field_mut(id)?;
        field.control.scroll_top = scroll_top;
        sync_scroll(&field.control, field.overlay.as_mut());
        Ok(())
    }

    pub fn evaluation_request(&self, id: &str) -> Result<EvaluationRequest, OverlayError> {
        let field = self
            .field(id)
            .ok_or_else(|| OverlayError::UnknownQuestion(id.to_string()))?;
        Ok(EvaluationRequest {
            question_id: field.id.clone(),
            answer: field.control.value.clone(),
            context: field.context.clone(),
        })
    }

    /// Request feedback and a score for one answer and apply both.
    ///
    /// Remote failures are rendered as the fallback notice and logged; only
    /// an unknown question id is returned as an error.
    pub async fn evaluate<B: Backend>(&mut self, backend: &B, id: &str) -> Result<(), OverlayError> {
        let request = self.evaluation_request(id)?;
        {
            let field = self.field_mut(id)?;
            field.panel.loading = true;
            field.panel.notice = None;
        }
        info!(question = %id, chars = request.answer.len(), "evaluating answer");

        let mut pending: FuturesUnordered<LocalBoxFuture<'_, EvalReply>> = FuturesUnordered::new();
        pending.push(async { EvalReply::Feedback(backend.generate_feedback(&request).await) }.boxed_local());
        pending.push(async { EvalReply::Score(backend.score_answer(&request).await) }.boxed_local());

        while let Some(reply) = pending.next().await {
            match reply {
                EvalReply::Feedback(result) => self.apply_feedback(id, result)?,
                EvalReply::Score(result) => self.apply_score(id, result)?,
            }
        }
        Ok(())
    }

    /// Apply a feedback reply: replace the panel and the highlight set.
    pub fn apply_feedback(
        &mut self,
        id: &str,
        result: Result<FeedbackResponse, BackendError>,
    ) -> Result<(), OverlayError> {
        let field = self.field_mut(id)?;
        field.panel.loading = false;
        match result {
            Ok(response) => {
                debug!(
                    question = %id,
                    items = response.feedback.len(),
                    fragments = response.fragments.len(),
                    "feedback received"
                );
                field.panel.render(id, &response.feedback);
                field.mode = if response.fragments.is_empty() {
                    OverlayMode::Mirror
                } else {
                    OverlayMode::Annotated(response.fragments)
                };
            }
            Err(e) => {
                warn!(question = %id, error = %e, "feedback request failed");
                field.panel.show_fallback();
                field.mode = OverlayMode::Mirror;
            }
        }
        field.rerender_overlay();
        Ok(())
    }

    /// Apply a score reply through the ratchet.
    pub fn apply_score(
        &mut self,
        id: &str,
        result: Result<f64, BackendError>,
    ) -> Result<(), OverlayError> {
        let field = self.field_mut(id)?;
        match result {
            Ok(score) => {
                let raised = field.progress.reconcile(score);
                debug!(question = %id, score, raised, "score received");
            }
            Err(e) => warn!(question = %id, error = %e, "score request failed"),
        }
        Ok(())
    }

    /// Mark an answer as fully resolved: full bar, empty panel, no highlights.
    pub fn force_complete(&mut self, id: &str) -> Result<(), OverlayError> {
        let field = self.field_mut(id)?;
        field.progress.force_complete();
        field.panel.clear();
        field.mode = OverlayMode::Mirror;
        field.rerender_overlay();
        info!(question = %id, "answer marked complete");
        Ok(())
    }

    /// Explicit score reset; the next score of any value will apply.
    pub fn reset_score(&mut self, id: &str) -> Result<(), OverlayError> {
        self.field_mut(id)?.progress.reset();
        Ok(())
    }

    /// Drop the active fragments and go back to mirroring plain text.
    pub fn clear_highlights(&mut self, id: &str) -> Result<(), OverlayError> {
        let field = self.field_mut(id)?;
        field.mode = OverlayMode::Mirror;
        field.rerender_overlay();
        Ok(())
    }

    /// Click on the `index`-th item of a question's panel.
    ///
    /// Evaluation items start a focused conversation that replaces the
    /// transcript. Routed items seed the chat input with `[target] text`.
    pub async fn select_item<B: Backend>(
        &mut self,
        backend: &B,
        id: &str,
        index: usize,
    ) -> Result<(), OverlayError> {
        let event = self
            .field_mut(id)?
            .panel
            .items
            .get(index)
            .map(|item| item.event.clone())
            .ok_or_else(|| OverlayError::UnknownItem {
                question: id.to_string(),
                index,
            })?;

        match event {
            ItemEvent::Discuss {
                question_id,
                feedback_text,
                fragment_index,
            } => {
                debug!(question = %question_id, fragment_index, "starting focused conversation");
                self.transcript.loading = true;
                let request = SeedRequest {
                    question_id,
                    feedback: feedback_text,
                };
                let result = backend.start_conversation(&request).await;
                self.transcript.loading = false;
                match result {
                    Ok(messages) => {
                        self.transcript.replace(messages);
                        Ok(())
                    }
                    Err(e) => {
                        warn!(question = %id, error = %e, "conversation request failed");
                        self.transcript
                            .replace(vec![ChatMessage::new(SYSTEM_ROLE, FEEDBACK_FALLBACK)]);
                        Err(e.into())
                    }
                }
            }
            ItemEvent::SeedChat { target, text } => {
                self.chat_input = format!("[{target}] {text}");
                Ok(())
            }
        }
    }

    /// Send a chat message and route the reply to the targets it names.
    pub async fn send_chat<B: Backend>(
        &mut self,
        backend: &B,
        message: &str,
    ) -> Result<DispatchReport, OverlayError> {
        self.transcript.loading = true;
        self.chat_input.clear();
        let request = ChatRequest {
            message: message.to_string(),
        };
        let result = backend.chat(&request).await;
        self.transcript.loading = false;
        match result {
            Ok(reply) => {
                let targets = TargetList::from(reply.target);
                let report = self.dispatch(&reply.response, &targets, message);
                info!(
                    delivered = report.delivered.len(),
                    ignored = report.ignored.len(),
                    "chat reply routed"
                );
                Ok(report)
            }
            Err(e) => {
                warn!(error = %e, "chat request failed");
                self.transcript.push_exchange(message, FEEDBACK_FALLBACK);
                Err(e.into())
            }
        }
    }

    pub fn dispatch(&mut self, response: &str, targets: &TargetList, message: &str) -> DispatchReport {
        dispatch(self, response, targets, message)
    }

    /// Current answers keyed by question id.
    pub fn answers(&self) -> Answers {
        self.fields
            .iter()
            .map(|f| (f.id.clone(), f.control.value.clone()))
            .collect()
    }

    pub async fn save<B: Backend>(&self, backend: &B) -> Result<SaveOutcome, OverlayError> {
        let answers = self.answers();
        match backend.save_answers(&answers).await {
            Ok(outcome) => {
                info!(answers = answers.len(), "answers saved");
                Ok(outcome)
            }
            Err(e) => {
                warn!(error = %e, "save failed");
                Err(e.into())
            }
        }
    }

    /// Load saved answers into every registered field. Fields missing from
    /// the reply are set to the empty string.
    pub async fn load<B: Backend>(&mut self, backend: &B) -> Result<(), OverlayError> {
        let mut answers = match backend.load_answers().await {
            Ok(answers) => answers,
            Err(e) => {
                warn!(error = %e, "load failed");
                return Err(e.into());
            }
        };
        let ids: Vec<String> = self.fields.iter().map(|f| f.id.clone()).collect();
        for id in ids {
            let text = answers.remove(&id).unwrap_or_default();
            self.input(&id, text)?;
        }
        for unknown in answers.keys() {
            debug!(question = %unknown, "ignoring saved answer for unregistered question");
        }
        Ok(())
    }
}

impl DispatchSink for Workspace {
    fn panel_mut(&mut self, question_id: &str) -> Option<&mut FeedbackPanel> {
        let &i = self.index.get(question_id)?;
        Some(&mut self.fields[i].panel)
    }

    fn transcript_mut(&mut self) -> &mut ChatTranscript {
        &mut self.transcript
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::overlay::MonospaceMeasure;
    use crate::palette::HIGH_SCORE;
    use crate::sanitize::escape;

    fn workspace() -> Workspace {
        let mut ws = Workspace::new(MonospaceMeasure::default());
        ws.register(FieldSpec::new("q1").context("be brief")).unwrap();
        ws.register(FieldSpec::new("q2").without_overlay()).unwrap();
        ws
    }

    fn feedback(items: &[&str], extracts: &[&str]) -> FeedbackResponse {
        let body = serde_json::json!({ "q1": items, "q1_extracts": extracts });
        FeedbackResponse::from_json("q1", &body).unwrap()
    }

    #[test]
    fn test_register_duplicate_rejected() {
        let mut ws = workspace();
        assert!(matches!(
            ws.register(FieldSpec::new("q1")),
            Err(OverlayError::DuplicateQuestion(_))
        ));
    }

    #[test]
    fn test_input_unknown_question() {
        let mut ws = workspace();
        assert!(matches!(
            ws.input("zz", "x"),
            Err(OverlayError::UnknownQuestion(_))
        ));
    }

    #[test]
    fn test_input_mirrors_escaped_text() {
        let mut ws = workspace();
        let h = ws.input("q1", "a <b> & c").unwrap();
        let field = ws.field("q1").unwrap();
        let overlay = field.overlay.as_ref().unwrap();
        assert_eq!(overlay.markup, escape("a <b> & c"));
        assert_eq!(overlay.height, h);
        assert_eq!(field.control.height_px(), Some(h));
    }

    #[test]
    fn test_input_without_overlay() {
        let mut ws = workspace();
        assert!(ws.input("q2", "hello").is_ok());
        assert!(ws.field("q2").unwrap().overlay.is_none());
    }

    #[test]
    fn test_evaluation_request_carries_context() {
        let mut ws = workspace();
        ws.input("q1", "answer").unwrap();
        let req = ws.evaluation_request("q1").unwrap();
        assert_eq!(req.answer, "answer");
        assert_eq!(req.context, "be brief");
    }

    #[test]
    fn test_apply_feedback_annotates_and_renders_panel() {
        let mut ws = workspace();
        ws.input("q1", "That is a good point indeed").unwrap();
        ws.apply_feedback("q1", Ok(feedback(&["Good point!"], &["good point"])))
            .unwrap();
        let field = ws.field("q1").unwrap();
        let markup = &field.overlay.as_ref().unwrap().markup;
        assert_eq!(markup.matches("<span").count(), 1);
        assert!(markup.contains(">good point</span>"));
        assert_eq!(field.panel.items.len(), 1);
        assert_eq!(field.panel.items[0].label, "Good point!");
        assert!(!field.panel.loading);
    }

    #[test]
    fn test_highlights_follow_typing() {
        let mut ws = workspace();
        ws.input("q1", "a good point").unwrap();
        ws.apply_feedback("q1", Ok(feedback(&["x"], &["good"]))).unwrap();
        ws.input("q1", "still good here").unwrap();
        let markup = &ws.field("q1").unwrap().overlay.as_ref().unwrap().markup;
        assert!(markup.starts_with("still "));
        assert!(markup.contains(">good</span>"));
    }

    #[test]
    fn test_apply_feedback_failure_shows_fallback() {
        let mut ws = workspace();
        ws.input("q1", "text here").unwrap();
        ws.apply_feedback("q1", Ok(feedback(&["x"], &["text"]))).unwrap();
        ws.apply_feedback("q1", Err(BackendError::malformed("q1", "key absent")))
            .unwrap();
        let field = ws.field("q1").unwrap();
        assert_eq!(field.panel.notice.as_deref(), Some(FEEDBACK_FALLBACK));
        assert!(field.panel.items.is_empty());
        assert!(!field.panel.loading);
        assert_eq!(field.overlay.as_ref().unwrap().markup, "text here");
    }

    #[test]
    fn test_score_ratchet_any_order() {
        let mut ws = workspace();
        ws.apply_score("q1", Ok(0.7)).unwrap();
        ws.apply_score("q1", Ok(0.4)).unwrap();
        let p = &ws.field("q1").unwrap().progress;
        assert!((p.displayed_score() - 0.7).abs() < 1e-9);
    }

    #[test]
    fn test_score_failure_leaves_indicator() {
        let mut ws = workspace();
        ws.apply_score("q1", Ok(0.5)).unwrap();
        ws.apply_score("q1", Err(BackendError::malformed("score", "absent")))
            .unwrap();
        assert!((ws.field("q1").unwrap().progress.displayed_score() - 0.5).abs() < 1e-9);
    }

    #[test]
    fn test_zero_progress_width_keeps_ratchet() {
        let mut ws = Workspace::new(MonospaceMeasure::default());
        ws.register(FieldSpec::new("q1").progress_width(0.0)).unwrap();
        assert_eq!(ws.field("q1").unwrap().progress.container_width, 1.0);
        ws.apply_score("q1", Ok(0.9)).unwrap();
        ws.apply_score("q1", Ok(0.3)).unwrap();
        assert!((ws.field("q1").unwrap().progress.width_percent - 90.0).abs() < 1e-9);
    }

    #[test]
    fn test_scores_independent_per_question() {
        let mut ws = workspace();
        ws.apply_score("q1", Ok(0.9)).unwrap();
        ws.apply_score("q2", Ok(0.2)).unwrap();
        assert!((ws.field("q2").unwrap().progress.displayed_score() - 0.2).abs() < 1e-9);
    }

    #[test]
    fn test_force_complete_clears_panel() {
        let mut ws = workspace();
        ws.input("q1", "good").unwrap();
        ws.apply_feedback("q1", Ok(feedback(&["x"], &["good"]))).unwrap();
        ws.apply_score("q1", Ok(0.3)).unwrap();
        ws.force_complete("q1").unwrap();
        let field = ws.field("q1").unwrap();
        assert_eq!(field.progress.width_percent, 100.0);
        assert_eq!(field.progress.color, HIGH_SCORE);
        assert!(field.panel.items.is_empty());
        assert_eq!(field.overlay.as_ref().unwrap().markup, "good");
    }

    #[test]
    fn test_reset_score_then_lower_applies() {
        let mut ws = workspace();
        ws.apply_score("q1", Ok(0.9)).unwrap();
        ws.reset_score("q1").unwrap();
        ws.apply_score("q1", Ok(0.1)).unwrap();
        assert!((ws.field("q1").unwrap().progress.displayed_score() - 0.1).abs() < 1e-9);
    }

    #[test]
    fn test_dispatch_through_workspace() {
        let mut ws = workspace();
        let targets = TargetList::normalize(crate::router::RawTargets::Many(vec![
            "feedback-q1".into(),
            "chat".into(),
        ]));
        let report = ws.dispatch("X", &targets, "hello");
        assert_eq!(report.delivered.len(), 2);
        assert_eq!(ws.field("q1").unwrap().panel.items.len(), 1);
        assert_eq!(ws.transcript().entries.len(), 1);
    }

    #[test]
    fn test_scroll_syncs_overlay() {
        let mut ws = workspace();
        ws.scroll("q1", 120).unwrap();
        assert_eq!(ws.field("q1").unwrap().overlay.as_ref().unwrap().scroll_top, 120);
    }

    #[test]
    fn test_answers_in_registration_order() {
        let mut ws = workspace();
        ws.input("q2", "two").unwrap();
        let answers = ws.answers();
        assert_eq!(answers.get("q1").map(String::as_str), Some(""));
        assert_eq!(answers.get("q2").map(String::as_str), Some("two"));
    }

    #[test]
    fn test_from_config_registers_questions() {
        let ws = Workspace::from_config(&OverlayConfig::default()).unwrap();
        assert_eq!(ws.fields().count(), 3);
        assert!(ws.field("q3").unwrap().context.contains("goal"));
    }
}
