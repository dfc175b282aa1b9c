//! Per-invocation session context. Handlers thread this struct through
//! explicitly; there is no ambient global state.

use std::path::PathBuf;

use indexmap::IndexMap;

use crate::report::ReportEntry;

/// State accumulated across the steps of one invocation: the last single
/// insight, the aggregated batch text, the per-metric report map (keyed by
/// metric name, insertion-ordered, each metric at most once) and the path
/// of the last assembled document.
#[derive(Debug, Default)]
pub struct Session {
    pub last_insight: Option<String>,
    pub all_insights: Option<String>,
    pub report: IndexMap<String, ReportEntry>,
    pub final_report: Option<PathBuf>,
}

impl Session {
    pub fn new() -> Self {
        Self::default()
    }
}
