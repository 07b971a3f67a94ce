//! Markdown rendering of a smoke run

use std::fmt::Write as _;
use std::time::Duration;

use chrono::{SecondsFormat, Utc};

pub struct CaseResult {
    pub name: &'static str,
    pub group: &'static str,
    /// Detail on success, error chain on failure.
    pub outcome: Result<String, String>,
    pub duration: Duration,
}

pub struct Report {
    target: String,
    started_at: String,
    results: Vec<CaseResult>,
}

const STATUS_LEGEND: [(&str, &str); 5] = [
    ("200", "OK: read or update succeeded"),
    ("201", "Created"),
    ("404", "Not found"),
    (
        "409",
        "Conflict: duplicate driver profile, still-referenced delete or disallowed ride transition",
    ),
    ("422", "Unprocessable: invalid payload or missing referenced record"),
];

impl Report {
    pub fn new(target: &str) -> Self {
        Self {
            target: target.to_string(),
            started_at: Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true),
            results: Vec::new(),
        }
    }

    pub fn push(&mut self, result: CaseResult) {
        self.results.push(result);
    }

    pub fn len(&self) -> usize {
        self.results.len()
    }

    pub fn failed(&self) -> usize {
        self.results.iter().filter(|r| r.outcome.is_err()).count()
    }

    pub fn to_markdown(&self) -> String {
        let passed = self.len() - self.failed();
        let total: Duration = self.results.iter().map(|r| r.duration).sum();

        let mut out = String::new();
        let _ = writeln!(out, "# Smoke test results\n");
        let _ = writeln!(out, "- Target: `{}`", self.target);
        let _ = writeln!(out, "- Started: {}", self.started_at);
        let _ = writeln!(
            out,
            "- Passed: {passed}/{} in {:.2}s\n",
            self.len(),
            total.as_secs_f64()
        );

        let _ = writeln!(out, "| # | Case | Group | Status | Detail | Duration |");
        let _ = writeln!(out, "|---|------|-------|--------|--------|----------|");
        for (i, result) in self.results.iter().enumerate() {
            let (status, detail) = match &result.outcome {
                Ok(detail) => ("PASSED", detail.as_str()),
                Err(error) => ("FAILED", error.as_str()),
            };
            let _ = writeln!(
                out,
                "| {} | {} | {} | {} | {} | {} ms |",
                i + 1,
                result.name,
                result.group,
                status,
                escape_cell(detail),
                result.duration.as_millis()
            );
        }

        let _ = writeln!(out, "\n## Status legend\n");
        let _ = writeln!(out, "| Code | Meaning |");
        let _ = writeln!(out, "|------|---------|");
        for (code, meaning) in STATUS_LEGEND {
            let _ = writeln!(out, "| {code} | {meaning} |");
        }
        out
    }
}

fn escape_cell(text: &str) -> String {
    text.replace('|', "\\|").replace('\n', " ")
}
