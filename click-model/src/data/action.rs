use serde::{Deserialize, Serialize};

use crate::error::Error;

/// Kind of a logged interaction event.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ActionKind {
    Click,
    #[serde(rename = "MMov")]
    MouseMove,
    SatFeedback,
    /// Any other event (scrolls, key presses, hovers, page visibility changes, ...).
    #[serde(other)]
    Other,
}

/// A single interaction event.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Action {
    #[serde(rename = "type")]
    pub kind: ActionKind,
    /// Timestamp in milliseconds.
    pub ts: i64,
    /// The clicked URL, if the event is a click on a result link.
    pub target: Option<String>,
    /// Rank of the result the event relates to, as logged.
    pub rank: Option<u32>,
}

impl Action {
    pub fn new(kind: ActionKind, ts: i64) -> Self {
        Self {
            kind,
            ts,
            target: None,
            rank: None,
        }
    }

    pub fn with_target(mut self, target: impl Into<String>, rank: Option<u32>) -> Self {
        self.target = Some(target.into());
        self.rank = rank;
        self
    }

    pub fn is_click(&self) -> bool {
        self.kind == ActionKind::Click
    }
}

/// Decodes the JSON encoded actions of a log row.
pub fn parse_actions(json: &str) -> Result<Vec<Action>, Error> {
    serde_json::from_str(json).map_err(Error::MalformedActions)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_deserialize_actions() {
        let json = r#"[
            {"type": "MMov", "ts": 10, "target": null, "rank": null},
            {"type": "Click", "ts": 20, "target": "https://example.com", "rank": 3},
            {"type": "PageHide", "ts": 30, "target": null, "rank": null}
        ]"#;
        let actions = parse_actions(json).unwrap();

        assert_eq!(actions[0].kind, ActionKind::MouseMove);
        assert_eq!(
            actions[1],
            Action::new(ActionKind::Click, 20).with_target("https://example.com", Some(3))
        );
        assert_eq!(actions[2].kind, ActionKind::Other);
    }

    #[test]
    fn test_malformed_actions() {
        assert!(matches!(
            parse_actions(r#"[{"type": "Click"}]"#),
            Err(Error::MalformedActions(_))
        ));
    }
}
