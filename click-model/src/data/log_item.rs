use std::fmt;

use derive_more::{Display, From};
use serde::{Deserialize, Serialize};

use crate::data::action::Action;

/// Identifier of a query-document pair as it was shown on a SERP.
#[derive(Clone, Debug, Display, From, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct LogId(pub String);

impl From<&str> for LogId {
    fn from(id: &str) -> Self {
        Self(id.to_owned())
    }
}

impl LogId {
    /// The id of the SERP the item was shown on, i.e. the id without its last `_` component.
    pub fn serp_id(&self) -> &str {
        self.0.rsplit_once('_').map_or("", |(serp, _)| serp)
    }
}

/// A document snippet shown on a SERP together with the actions performed on it.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct LogItem {
    pub id: LogId,
    pub actions: Vec<Action>,
    pub fixation: bool,
    pub long_click: bool,
}

impl LogItem {
    /// Creates a new log item, a click implies a fixation.
    pub fn new(id: impl Into<LogId>, actions: Vec<Action>) -> Self {
        let fixation = actions.iter().any(Action::is_click);
        Self {
            id: id.into(),
            actions,
            fixation,
            long_click: false,
        }
    }

    pub fn click(&self) -> bool {
        self.actions.iter().any(Action::is_click)
    }

    /// Ordinal engagement score: long click > click > fixation > hover > nothing.
    pub fn score(&self) -> u8 {
        if self.long_click {
            4
        } else if self.click() {
            3
        } else if self.fixation {
            2
        } else if !self.actions.is_empty() {
            1
        } else {
            0
        }
    }

    /// Latest timestamp of all actions, `0` if there are none.
    pub fn max_ts(&self) -> i64 {
        self.actions.iter().map(|a| a.ts).max().unwrap_or(0)
    }

    /// Removes all actions after the given timestamp.
    pub fn clear_after(&mut self, ts: i64) {
        self.actions.retain(|a| a.ts <= ts);
    }
}

impl fmt::Display for LogItem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let prefix = if self.long_click {
            "lc"
        } else if self.click() {
            "c"
        } else if self.fixation {
            "f"
        } else if !self.actions.is_empty() {
            "h"
        } else {
            return write!(f, "{}", self.id);
        };
        write!(f, "{} [{}]", self.id, prefix)
    }
}
