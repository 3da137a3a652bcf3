//! Per-resource results and terminal status lines.

use crate::constants::{DEFAULT_TERMINAL_WIDTH, SUCCESS_STATUS_CODES};
use crate::manifest::ResourceKind;
use std::fmt;

const GREEN: &str = "\x1b[1;32m";
const RED: &str = "\x1b[1;31m";
const BLUE: &str = "\x1b[94m";
const CYAN: &str = "\x1b[96m";
const RESET: &str = "\x1b[0m";

/// What happened to one resource
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DispatchOutcome {
    /// Call made and answered with a success status
    Applied,
    /// Call made and answered with any other status
    Failed,
    /// Delete of a resource that does not exist
    Skipped,
    /// Resource could not be dispatched (unknown method, missing name)
    Invalid(String),
}

/// Outcome of reconciling one manifest entry
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DispatchResult {
    pub kind: ResourceKind,
    pub name: String,
    /// Declared method, `None` when the manifest gave none
    pub method: Option<String>,
    pub status: Option<u16>,
    pub outcome: DispatchOutcome,
}

impl DispatchResult {
    pub(crate) fn from_status(kind: ResourceKind, name: &str, method: &str, status: u16) -> Self {
        let outcome = if SUCCESS_STATUS_CODES.contains(&status) {
            DispatchOutcome::Applied
        } else {
            DispatchOutcome::Failed
        };
        Self {
            kind,
            name: name.to_string(),
            method: Some(method.to_string()),
            status: Some(status),
            outcome,
        }
    }

    pub(crate) fn without_call(
        kind: ResourceKind,
        name: &str,
        method: Option<&str>,
        outcome: DispatchOutcome,
    ) -> Self {
        Self {
            kind,
            name: name.to_string(),
            method: method.map(ToString::to_string),
            status: None,
            outcome,
        }
    }

    #[must_use]
    pub fn success(&self) -> bool {
        self.outcome == DispatchOutcome::Applied
    }
}

/// Counts over a whole run
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunSummary {
    pub applied: usize,
    pub failed: usize,
    pub skipped: usize,
    pub invalid: usize,
}

impl RunSummary {
    #[must_use]
    pub fn from_results(results: &[DispatchResult]) -> Self {
        results.iter().fold(Self::default(), |mut summary, result| {
            match result.outcome {
                DispatchOutcome::Applied => summary.applied += 1,
                DispatchOutcome::Failed => summary.failed += 1,
                DispatchOutcome::Skipped => summary.skipped += 1,
                DispatchOutcome::Invalid(_) => summary.invalid += 1,
            }
            summary
        })
    }

    /// No resource failed or was invalid
    #[must_use]
    pub fn is_clean(&self) -> bool {
        self.failed == 0 && self.invalid == 0
    }
}

impl fmt::Display for RunSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} applied, {} failed, {} skipped, {} invalid",
            self.applied, self.failed, self.skipped, self.invalid
        )
    }
}

/// How an apply run ended, when it did not fail outright
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunOutcome {
    /// No enabled resource had a body to apply
    NothingToApply,
    /// Every resource was dispatched
    Completed(RunSummary),
}

impl RunOutcome {
    /// `0` when nothing needed applying or every resource succeeded or was
    /// skipped, `1` when any resource failed or was invalid
    #[must_use]
    pub fn exit_status(&self) -> u8 {
        match self {
            Self::NothingToApply => 0,
            Self::Completed(summary) if summary.is_clean() => 0,
            Self::Completed(_) => 1,
        }
    }
}

/// Status line printed after a dispatched operation
#[must_use]
pub fn status_line(result: &DispatchResult) -> String {
    let method = result.method.as_deref().unwrap_or("-");
    match (&result.outcome, result.status) {
        (DispatchOutcome::Applied, _) => format!(
            "{GREEN} Successfully applied '{BLUE}{}{RESET}{GREEN}' on {CYAN}{}{RESET}{GREEN} {}!{RESET}\n",
            method, result.name, result.kind
        ),
        (DispatchOutcome::Invalid(reason), _) => format!(
            "{RED} Error! {} {}: {}{RESET}",
            result.kind, result.name, reason
        ),
        (_, status) => format!(
            "{RED} Failed to perform {} on {} {}. Status Code: {}{RESET}",
            method,
            result.name,
            result.kind,
            status.map_or_else(|| "none".to_string(), |s| s.to_string())
        ),
    }
}

/// Full-width separator, sized from `COLUMNS`
#[must_use]
pub fn separator() -> String {
    let width = std::env::var("COLUMNS")
        .ok()
        .and_then(|c| c.trim().parse::<usize>().ok())
        .filter(|w| *w > 0)
        .unwrap_or(DEFAULT_TERMINAL_WIDTH);
    "-".repeat(width)
}

/// Print the status line (if any) and a separator
pub fn print_result(result: &DispatchResult) {
    if result.outcome != DispatchOutcome::Skipped {
        println!("{}", status_line(result));
    }
    println!("{}", separator());
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_success_requires_listed_status() {
        for status in [200, 201, 202] {
            assert!(DispatchResult::from_status(ResourceKind::Application, "a", "create", status).success());
        }
        for status in [204, 400, 403, 409, 500] {
            let result = DispatchResult::from_status(ResourceKind::Application, "a", "create", status);
            assert_eq!(result.outcome, DispatchOutcome::Failed, "status {status}");
        }
    }

    #[test]
    fn test_status_lines() {
        let ok = DispatchResult::from_status(ResourceKind::Project, "platform", "update", 200);
        let line = status_line(&ok);
        assert!(line.contains("Successfully applied"));
        assert!(line.contains("platform"));

        let failed = DispatchResult::from_status(ResourceKind::Repository, "charts", "create", 400);
        let line = status_line(&failed);
        assert!(line.contains("Failed to perform create on charts repository"));
        assert!(line.contains("Status Code: 400"));
    }

    #[test]
    fn test_summary_counts() {
        let results = vec![
            DispatchResult::from_status(ResourceKind::Application, "a", "create", 200),
            DispatchResult::from_status(ResourceKind::Application, "b", "update", 500),
            DispatchResult::without_call(ResourceKind::Application, "c", Some("delete"), DispatchOutcome::Skipped),
            DispatchResult::without_call(
                ResourceKind::Application,
                "d",
                Some("patch"),
                DispatchOutcome::Invalid("invalid method name 'patch'".to_string()),
            ),
        ];
        let summary = RunSummary::from_results(&results);
        assert_eq!(
            summary,
            RunSummary {
                applied: 1,
                failed: 1,
                skipped: 1,
                invalid: 1,
            }
        );
        assert!(!summary.is_clean());
        assert_eq!(summary.to_string(), "1 applied, 1 failed, 1 skipped, 1 invalid");
    }

    #[test]
    fn test_run_outcome_exit_status() {
        assert_eq!(RunOutcome::NothingToApply.exit_status(), 0);
        let clean = RunSummary {
            applied: 2,
            skipped: 1,
            ..RunSummary::default()
        };
        assert_eq!(RunOutcome::Completed(clean).exit_status(), 0);
        let failed = RunSummary {
            applied: 2,
            failed: 1,
            ..RunSummary::default()
        };
        assert_eq!(RunOutcome::Completed(failed).exit_status(), 1);
        let invalid = RunSummary {
            invalid: 1,
            ..RunSummary::default()
        };
        assert_eq!(RunOutcome::Completed(invalid).exit_status(), 1);
    }
}
