//! Click models of user browsing behaviour over a search-results page (SERP).
//!
//! The crate turns raw interaction traces into per-snippet log items, aggregates crowd relevance
//! judgments, fits click models (most notably CAS: Cascade / Attractiveness / Satisfaction) by
//! maximum likelihood and evaluates them offline against relevance judgments.

mod data;
mod error;
pub mod eval;
pub mod io;
mod log_processor;
pub mod model;
pub mod optimizer;
pub mod relevance;
mod utils;

pub use crate::{
    data::{
        action::{parse_actions, Action, ActionKind},
        log_item::{LogId, LogItem},
        session::{ingest_sessions, parse_sat, Ingested, SerpSession, SessionRow},
        snippet::{Snippet, SnippetLayout, SNIPPET_CLASSES},
    },
    error::Error,
    log_processor::{ProcessorThresholds, SessionLogProcessor, TraceEvent},
};
