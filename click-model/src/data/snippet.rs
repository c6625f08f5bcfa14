use std::{collections::BTreeSet, str::FromStr};

use lazy_static::lazy_static;
use serde::{Deserialize, Serialize};

use crate::error::Error;

lazy_static! {
    /// The CSS class signatures of result snippets observed on the logged SERPs.
    ///
    /// Every signature gets its own one-hot examination feature.
    pub static ref SNIPPET_CLASSES: Vec<BTreeSet<&'static str>> = [
        &["g"][..],
        &["_oqc", "g"],
        &["g", "g-blk", "kno-kp", "mnr-c"],
        &["g", "g-blk", "mnr-c", "rhsvw"],
        &["g", "g-blk", "kno-kp", "mnr-c", "rhsvw"],
        &["g", "g-blk", "kno-fb-suppressed", "kno-kp", "mnr-c", "rhsvw"],
        &["_Nn", "_wbb", "card-section", "g"],
        &["_df", "_mZd", "card-section", "g"],
        &["_Abb", "_Nn", "card-section", "g"],
        &["currency", "g", "obcontainer", "vk_c"],
    ]
    .iter()
    .map(|classes| classes.iter().copied().collect())
    .collect();
}

/// Rendered geometry of a snippet, relative to its offset parent.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SnippetLayout {
    /// Element id of the reference element the offsets are relative to.
    pub offset_parent: String,
    pub offset_left: i64,
    pub offset_top: i64,
    pub width: i64,
    pub height: i64,
}

impl FromStr for SnippetLayout {
    type Err = Error;

    /// Parses the `offset_parent;offset_left;offset_top;width;height` layout annotation.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let malformed = || Error::MalformedLayout(s.to_owned());
        let mut parts = s.split(';');
        let offset_parent = parts.next().ok_or_else(malformed)?.to_owned();
        let mut next_int = || -> Result<i64, Error> {
            parts
                .next()
                .and_then(|part| part.trim().parse().ok())
                .ok_or_else(malformed)
        };
        let layout = Self {
            offset_parent,
            offset_left: next_int()?,
            offset_top: next_int()?,
            width: next_int()?,
            height: next_int()?,
        };

        if parts.next().is_some() {
            Err(malformed())
        } else {
            Ok(layout)
        }
    }
}

/// A result snippet as rendered on the SERP.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Snippet {
    pub classes: BTreeSet<String>,
    pub layout: SnippetLayout,
}

impl Snippet {
    pub fn new<'a>(classes: impl IntoIterator<Item = &'a str>, layout: SnippetLayout) -> Self {
        Self {
            classes: classes.into_iter().map(Into::into).collect(),
            layout,
        }
    }

    /// Position of the class signature of this snippet in [`SNIPPET_CLASSES`].
    pub fn class_index(&self) -> Result<usize, Error> {
        SNIPPET_CLASSES
            .iter()
            .position(|signature| {
                signature
                    .iter()
                    .copied()
                    .eq(self.classes.iter().map(String::as_str))
            })
            .ok_or_else(|| Error::UnknownSnippetClass(self.classes.iter().cloned().collect()))
    }
}
