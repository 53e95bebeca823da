//! # Dialogue Signals
//!
//! Dialogue actors end a stage by appending a fixed marker line to their own
//! output. This module is the only place that reads those markers.

use serde::{Deserialize, Serialize};

/// Completion signal found in a dialogue actor's output
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DialogueSignal {
    /// Still mid-dialogue, wait for the next user turn
    None,
    /// Interview finished, ask the user to confirm the summary
    MiningComplete,
    /// User asked for changes, run the actor again
    RevisionRequested,
    /// User confirmed the summary, hand off to the auditor
    UserConfirmed,
}

/// Marker strings emitted by one dialogue actor
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SignalMarkers {
    pub mining_complete: &'static str,
    pub revision_requested: &'static str,
    pub user_confirmed: &'static str,
}

impl SignalMarkers {
    pub const DISCOVERY: SignalMarkers = SignalMarkers {
        mining_complete: "[Discovery_Expert] 需求挖掘已完成",
        revision_requested: "[Discovery_Expert] 用户要求修改",
        user_confirmed: "[Discovery_Expert] 用户已确认",
    };

    pub const RESEARCH: SignalMarkers = SignalMarkers {
        mining_complete: "[Market_Researcher] 调研访谈已完成",
        revision_requested: "[Market_Researcher] 用户要求修改",
        user_confirmed: "[Market_Researcher] 用户已确认",
    };

    fn all(&self) -> [&'static str; 3] {
        [
            self.mining_complete,
            self.revision_requested,
            self.user_confirmed,
        ]
    }
}

/// Map raw actor output to a signal.
///
/// Checked in order: mining complete, revision requested, user confirmed.
/// An output carrying several markers resolves to the first one in that order.
pub fn detect_signal(text: &str, markers: &SignalMarkers) -> DialogueSignal {
    if text.contains(markers.mining_complete) {
        DialogueSignal::MiningComplete
    } else if text.contains(markers.revision_requested) {
        DialogueSignal::RevisionRequested
    } else if text.contains(markers.user_confirmed) {
        DialogueSignal::UserConfirmed
    } else {
        DialogueSignal::None
    }
}

/// Remove every marker from `text` and trim the result.
pub fn strip_markers(text: &str, markers: &SignalMarkers) -> String {
    markers
        .all()
        .iter()
        .fold(text.to_string(), |acc, marker| acc.replace(marker, ""))
        .trim()
        .to_string()
}

/// Strips markers from streamed fragments before they are relayed.
///
/// A marker may arrive split across fragments, so any tail that could still
/// grow into a marker is held back until the next fragment, along with the
/// whitespace in front of it.
#[derive(Debug)]
pub struct MarkerFilter {
    markers: SignalMarkers,
    pending: String,
}

impl MarkerFilter {
    pub fn new(markers: SignalMarkers) -> Self {
        Self {
            markers,
            pending: String::new(),
        }
    }

    /// Feed one fragment; returns the text that is safe to relay now.
    pub fn push(&mut self, fragment: &str) -> String {
        self.pending.push_str(fragment);
        let cleaned = self
            .markers
            .all()
            .iter()
            .fold(std::mem::take(&mut self.pending), |acc, marker| {
                acc.replace(marker, "")
            });

        let held = self.partial_marker_start(&cleaned);
        let cut = cleaned[..held].trim_end().len();
        self.pending = cleaned[cut..].to_string();
        cleaned[..cut].to_string()
    }

    /// Text still held back once the stream has ended
    pub fn finish(self) -> String {
        self.pending.trim_end().to_string()
    }

    /// Byte offset of the longest suffix of `text` that is a proper prefix
    /// of some marker; `text.len()` when there is none.
    fn partial_marker_start(&self, text: &str) -> usize {
        let markers = self.markers.all();
        text.char_indices()
            .map(|(i, _)| i)
            .find(|&i| {
                let tail = &text[i..];
                markers
                    .iter()
                    .any(|m| m.len() > tail.len() && m.starts_with(tail))
            })
            .unwrap_or(text.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_no_marker_is_none() {
        let text = "请问您的目标用户是谁？";
        assert_eq!(
            detect_signal(text, &SignalMarkers::DISCOVERY),
            DialogueSignal::None
        );
    }

    #[test]
    fn test_each_marker() {
        let m = SignalMarkers::DISCOVERY;
        assert_eq!(
            detect_signal("总结...\n[Discovery_Expert] 需求挖掘已完成", &m),
            DialogueSignal::MiningComplete
        );
        assert_eq!(
            detect_signal("[Discovery_Expert] 用户要求修改", &m),
            DialogueSignal::RevisionRequested
        );
        assert_eq!(
            detect_signal("好的。[Discovery_Expert] 用户已确认", &m),
            DialogueSignal::UserConfirmed
        );
    }

    #[test]
    fn test_markers_are_phase_specific() {
        let text = "[Discovery_Expert] 用户已确认";
        assert_eq!(
            detect_signal(text, &SignalMarkers::RESEARCH),
            DialogueSignal::None
        );
    }

    #[test]
    fn test_precedence_when_several_markers_present() {
        let m = SignalMarkers::DISCOVERY;
        let text = format!("{}\n{}", m.user_confirmed, m.mining_complete);
        assert_eq!(detect_signal(&text, &m), DialogueSignal::MiningComplete);
    }

    #[test]
    fn test_strip_markers() {
        let m = SignalMarkers::RESEARCH;
        let text = format!("竞品 A、B 的对比如下。\n{}", m.mining_complete);
        assert_eq!(strip_markers(&text, &m), "竞品 A、B 的对比如下。");
        assert!(strip_markers(m.user_confirmed, &m).is_empty());
    }

    fn relay(fragments: &[&str], markers: SignalMarkers) -> Vec<String> {
        let mut filter = MarkerFilter::new(markers);
        let mut relayed: Vec<String> = fragments
            .iter()
            .map(|f| filter.push(f))
            .filter(|t| !t.is_empty())
            .collect();
        let rest = filter.finish();
        if !rest.is_empty() {
            relayed.push(rest);
        }
        relayed
    }

    #[test]
    fn test_filter_holds_back_split_marker() {
        let relayed = relay(
            &["总结\n[Discovery_Expert] 需求", "挖掘已完成"],
            SignalMarkers::DISCOVERY,
        );
        assert_eq!(relayed, vec!["总结"]);
    }

    #[test]
    fn test_filter_passes_plain_fragments() {
        let relayed = relay(&["你好，", "请问目标用户是谁？"], SignalMarkers::DISCOVERY);
        assert_eq!(relayed, vec!["你好，", "请问目标用户是谁？"]);
    }

    #[test]
    fn test_filter_releases_false_start() {
        let relayed = relay(&["参考 [Disc", "ord] 社区"], SignalMarkers::DISCOVERY);
        assert_eq!(relayed.concat(), "参考 [Discord] 社区");
    }

    #[test]
    fn test_filter_flushes_unfinished_prefix() {
        let relayed = relay(&["结尾 [Market"], SignalMarkers::RESEARCH);
        assert_eq!(relayed, vec!["结尾", " [Market"]);
    }
}
