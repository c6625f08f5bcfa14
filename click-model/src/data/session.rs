use itertools::Itertools;
use log::info;
use serde::{Deserialize, Serialize};

use crate::data::{
    action::Action,
    log_item::{LogId, LogItem},
    snippet::Snippet,
};

/// One search episode: the log items of a SERP, their snippets and the satisfaction label.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SerpSession {
    pub query: String,
    pub session: Vec<LogItem>,
    pub serp: Vec<Snippet>,
    pub sat: bool,
}

/// A processed log row, one per snippet of a SERP.
#[derive(Clone, Debug)]
pub struct SessionRow {
    pub log_id: LogId,
    pub query: String,
    /// Worker feedback, `SAT`, `DSAT` or anything else for unknown.
    pub sat_feedback: String,
    pub actions: Vec<Action>,
    pub fixation: bool,
    pub long_click: bool,
    pub snippet: Snippet,
}

impl SessionRow {
    fn log_item(&self) -> LogItem {
        LogItem {
            id: self.log_id.clone(),
            actions: self.actions.clone(),
            fixation: self.fixation,
            long_click: self.long_click,
        }
    }
}

/// Parses the worker satisfaction feedback, `None` if it is neither `SAT` nor `DSAT`.
pub fn parse_sat(sat_feedback: &str) -> Option<bool> {
    match sat_feedback {
        "SAT" => Some(true),
        "DSAT" => Some(false),
        _ => None,
    }
}

/// Sessions built from log rows together with ingestion statistics.
#[derive(Debug, Default)]
pub struct Ingested {
    pub sessions: Vec<SerpSession>,
    /// Number of SERPs skipped because of a missing or unknown satisfaction label.
    pub skipped: usize,
    /// Number of sessions labeled as satisfied.
    pub sat_true: usize,
}

impl Ingested {
    /// Share of SAT labels among the ingested sessions.
    pub fn sat_rate(&self) -> f64 {
        if self.sessions.is_empty() {
            0.
        } else {
            self.sat_true as f64 / self.sessions.len() as f64
        }
    }
}

/// Groups consecutive rows of the same SERP, query and feedback into sessions.
///
/// Groups whose satisfaction label can't be parsed are skipped and counted.
pub fn ingest_sessions(rows: impl IntoIterator<Item = SessionRow>) -> Ingested {
    let groups = rows.into_iter().group_by(|row| {
        (
            row.log_id.serp_id().to_owned(),
            row.query.clone(),
            row.sat_feedback.clone(),
        )
    });

    let ingested = groups
        .into_iter()
        .fold(Ingested::default(), |mut ingested, ((_, query, sat), rows)| {
            match parse_sat(&sat) {
                Some(sat) => {
                    ingested.sat_true += sat as usize;
                    let (session, serp) = rows
                        .map(|row| (row.log_item(), row.snippet))
                        .unzip();
                    ingested.sessions.push(SerpSession {
                        query,
                        session,
                        serp,
                        sat,
                    });
                }
                None => ingested.skipped += 1,
            }
            ingested
        });

    info!(
        "Skipped {} rows out of {}",
        ingested.skipped,
        ingested.skipped + ingested.sessions.len()
    );
    info!("{:.1}% of SAT labels in the data", ingested.sat_rate() * 100.);
    ingested
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::{action::ActionKind, snippet::SnippetLayout};

    fn row(log_id: &str, query: &str, sat: &str, click: bool) -> SessionRow {
        let actions = if click {
            vec![Action::new(ActionKind::Click, 1)]
        } else {
            Vec::new()
        };
        SessionRow {
            log_id: log_id.into(),
            query: query.into(),
            sat_feedback: sat.into(),
            actions,
            fixation: click,
            long_click: false,
            snippet: Snippet::new(vec!["g"], "1;0;10;400;100".parse::<SnippetLayout>().unwrap()),
        }
    }

    #[test]
    fn test_parse_sat() {
        assert_eq!(parse_sat("SAT"), Some(true));
        assert_eq!(parse_sat("DSAT"), Some(false));
        assert_eq!(parse_sat("undefined"), None);
        assert_eq!(parse_sat("absent"), None);
    }

    #[test]
    fn test_ingest_groups_and_skips() {
        let rows = vec![
            row("v2_0_a", "q0", "SAT", true),
            row("v2_0_b", "q0", "SAT", false),
            row("v2_1_a", "q1", "absent", false),
            row("v2_1_b", "q1", "absent", false),
            row("v2_2_a", "q2", "DSAT", false),
        ];
        let ingested = ingest_sessions(rows);

        assert_eq!(ingested.sessions.len(), 2);
        assert_eq!(ingested.skipped, 1);
        assert_eq!(ingested.sat_true, 1);
        assert_eq!(ingested.sessions[0].session.len(), 2);
        assert_eq!(ingested.sessions[0].serp.len(), 2);
        assert!(ingested.sessions[0].session[0].click());
        assert!(ingested.sessions[0].sat);
        assert!(!ingested.sessions[1].sat);
        assert_eq!(ingested.sessions[1].query, "q2");
    }
}
