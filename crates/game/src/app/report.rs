use std::fs;
use std::path::{Path, PathBuf};

use scrapyard_engine::ResetSession;
use serde::{Deserialize, Serialize};

const REPORT_VERSION: u32 = 1;
const REPORTS_DIR: &str = "reports";
const RESET_REPORT_FILE: &str = "resets.json";

pub(crate) type ReportResult<T> = Result<T, String>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub(crate) enum Outcome {
    Escaped,
    Stuck,
    Failed,
}

#[derive(Debug, Serialize, Deserialize)]
pub(crate) struct ResetReport {
    pub(crate) report_version: u32,
    pub(crate) outcome: Outcome,
    pub(crate) sessions: Vec<ResetSession>,
}

impl ResetReport {
    pub(crate) fn new(outcome: Outcome, sessions: &[ResetSession]) -> Self {
        Self {
            report_version: REPORT_VERSION,
            outcome,
            sessions: sessions.to_vec(),
        }
    }
}

pub(crate) fn report_path(cache_dir: &Path) -> PathBuf {
    cache_dir.join(REPORTS_DIR).join(RESET_REPORT_FILE)
}

pub(crate) fn write_report(cache_dir: &Path, report: &ResetReport) -> ReportResult<PathBuf> {
    let path = report_path(cache_dir);
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .map_err(|error| format!("create report dir '{}': {error}", parent.display()))?;
    }
    let json = serde_json::to_string_pretty(report)
        .map_err(|error| format!("encode report json: {error}"))?;
    fs::write(&path, json)
        .map_err(|error| format!("write report '{}': {error}", path.display()))?;
    Ok(path)
}
