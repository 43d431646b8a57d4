//! Chat routing: place a chat reply into the transcript and/or feedback
//! panels named by the server.

use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::debug;

use crate::panel::{ChatTranscript, FeedbackPanel};

/// Identifier of the chat transcript target.
pub const CHAT_TARGET: &str = "chat";
/// Prefix of feedback-panel targets; the rest is the question id.
pub const PANEL_PREFIX: &str = "feedback-";

/// A named destination for a routed reply.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum DispatchTarget {
    Chat,
    Panel(String),
    /// Anything else the server sent; dispatched nowhere.
    Unknown(String),
}

impl DispatchTarget {
    pub fn parse(raw: &str) -> Self {
        let raw = raw.trim();
        if raw == CHAT_TARGET {
            DispatchTarget::Chat
        } else if let Some(question_id) = raw.strip_prefix(PANEL_PREFIX) {
            DispatchTarget::Panel(question_id.to_string())
        } else {
            DispatchTarget::Unknown(raw.to_string())
        }
    }
}

impl fmt::Display for DispatchTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DispatchTarget::Chat => write!(f, "{CHAT_TARGET}"),
            DispatchTarget::Panel(q) => write!(f, "{PANEL_PREFIX}{q}"),
            DispatchTarget::Unknown(raw) => write!(f, "{raw}"),
        }
    }
}

/// Target field as sent on the wire: one label or a list of labels.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RawTargets {
    One(String),
    Many(Vec<String>),
}

/// A non-empty, ordered target list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TargetList(Vec<DispatchTarget>);

impl TargetList {
    /// Normalize wire targets. An empty list falls back to the chat
    /// transcript so a reply is never silently lost.
    pub fn normalize(raw: RawTargets) -> Self {
        let labels = match raw {
            RawTargets::One(label) => vec![label],
            RawTargets::Many(labels) => labels,
        };
        let targets: Vec<DispatchTarget> =
            labels.iter().map(|l| DispatchTarget::parse(l)).collect();
        if targets.is_empty() {
            TargetList(vec![DispatchTarget::Chat])
        } else {
            TargetList(targets)
        }
    }

    pub fn single(target: DispatchTarget) -> Self {
        TargetList(vec![target])
    }

    pub fn as_slice(&self) -> &[DispatchTarget] {
        &self.0
    }

    pub fn iter(&self) -> std::slice::Iter<'_, DispatchTarget> {
        self.0.iter()
    }
}

impl From<RawTargets> for TargetList {
    fn from(raw: RawTargets) -> Self {
        TargetList::normalize(raw)
    }
}

/// Chat service reply.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatReply {
    pub response: String,
    pub target: RawTargets,
}

/// Where routed replies land.
pub trait DispatchSink {
    fn panel_mut(&mut self, question_id: &str) -> Option<&mut FeedbackPanel>;
    fn transcript_mut(&mut self) -> &mut ChatTranscript;
}

/// Outcome of one dispatch, in encounter order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DispatchReport {
    pub delivered: Vec<DispatchTarget>,
    pub ignored: Vec<DispatchTarget>,
}

/// Deliver `response` to every target, in order.
///
/// Panel targets get one routed item; the chat target gets one exchange
/// entry pairing `message` with `response`. Targets naming no existing panel
/// are ignored.
pub fn dispatch(
    sink: &mut dyn DispatchSink,
    response: &str,
    targets: &TargetList,
    message: &str,
) -> DispatchReport {
    let mut report = DispatchReport::default();
    for target in targets.iter() {
        let delivered = match target {
            DispatchTarget::Chat => {
                sink.transcript_mut().push_exchange(message, response);
                true
            }
            DispatchTarget::Panel(question_id) => match sink.panel_mut(question_id) {
                Some(panel) => {
                    panel.append_routed(&target.to_string(), response);
                    true
                }
                None => false,
            },
            DispatchTarget::Unknown(_) => false,
        };
        if delivered {
            report.delivered.push(target.clone());
        } else {
            debug!(target = %target, "no destination for routed reply");
            report.ignored.push(target.clone());
        }
    }
    report
}
