use displaydoc::Display;
use thiserror::Error;

use crate::{
    eval::EvalError,
    io::ParamStoreError,
    model::cas::ConfigError,
    relevance::RelevanceError,
};

/// The crate error.
#[derive(Debug, Display, Error)]
pub enum Error {
    /// The training data is empty
    EmptyDataset,
    /// Session has {log_items} log items but the serp has {snippets} snippets
    SerpMismatch { log_items: usize, snippets: usize },
    /// Unknown snippet class signature: {0:?}
    UnknownSnippetClass(Vec<String>),
    /// Snippets are spread over more than two columns
    TooManyColumns,
    /// Malformed snippet layout: {0}
    MalformedLayout(String),
    /// Malformed actions: {0}
    MalformedActions(serde_json::Error),
    /// Expected {expected} parameters but got {got}
    ParamsLength { expected: usize, got: usize },
    /// {0}
    Relevance(#[from] RelevanceError),
    /// {0}
    Config(#[from] ConfigError),
    /// {0}
    Params(#[from] ParamStoreError),
    /// {0}
    Evaluation(#[from] EvalError),
}
