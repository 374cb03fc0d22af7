//! 输出层：接收 DiagnosticReport，渲染 text 或 json
//!
//! `render` is pure: same report in, same text out.

use serde::Serialize;
use std::fmt::Write;
use std::io::{self, Write as _};
use tracing::debug;

use crate::check::orchestrator::Phase;
use crate::check::report::{CheckResult, CheckStatus, DiagnosticReport};
use crate::utils::{DiagError, Result};

const UNKNOWN: &str = "Unknown";

pub fn display(report: &DiagnosticReport, format: &str, phase: &mut Phase) -> Result<()> {
    publish(report, format, phase, io::stdout().lock())
}

/// REPORTING → DONE；下游提前关闭管道（`| head`）不算错误
pub fn publish<W: io::Write>(
    report: &DiagnosticReport,
    format: &str,
    phase: &mut Phase,
    mut out: W,
) -> Result<()> {
    phase.advance(Phase::Reporting);
    let text = render_as(report, format)?;
    match out.write_all(text.as_bytes()).and_then(|()| out.flush()) {
        Err(e) if e.kind() == io::ErrorKind::BrokenPipe => debug!("output closed early"),
        written => written?,
    }
    phase.advance(Phase::Done);
    Ok(())
}

pub fn render_as(report: &DiagnosticReport, format: &str) -> Result<String> {
    match format {
        "json" => render_json(report),
        "text" => Ok(render(report)),
        other  => Err(DiagError::ConfigInvalid(format!("unknown output format: {}", other))),
    }
}

// ── JSON ────────────────────────────────────────────────────────────────────

#[derive(Serialize)]
struct JsonReport<'a> {
    #[serde(flatten)]
    report: &'a DiagnosticReport,
    summary: Vec<SummaryLine>,
}

#[derive(Debug, PartialEq, Eq, Serialize)]
pub struct SummaryLine {
    pub index: usize,
    pub label: String,
    pub value: String,
}

fn render_json(report: &DiagnosticReport) -> Result<String> {
    let wrapped = JsonReport { report, summary: summary(report) };
    let mut json = serde_json::to_string_pretty(&wrapped)
        .map_err(|e| DiagError::Parse(format!("JSON serialize: {}", e)))?;
    json.push('\n');
    Ok(json)
}

// ── Text ────────────────────────────────────────────────────────────────────

pub fn render(report: &DiagnosticReport) -> String {
    let mut out = String::new();
    let total = report.results.len();

    section(&mut out, "DIAGNOSTIC REPORT");
    let _ = writeln!(out, "  Captured at  : {}", report.captured_at);
    let _ = writeln!(out, "  Checks       : {}  ({} ok, {} failed, {} skipped)",
        total,
        report.count(CheckStatus::Success),
        report.count(CheckStatus::Failure),
        report.count(CheckStatus::Skipped));

    section(&mut out, "CHECKS");
    for (i, r) in report.results.iter().enumerate() {
        render_result(&mut out, i + 1, total, r);
    }

    section(&mut out, "SUMMARY");
    for line in summary(report) {
        let _ = writeln!(out, "{}. {}: {}", line.index, line.label, line.value);
    }

    out
}

fn render_result(out: &mut String, n: usize, total: usize, r: &CheckResult) {
    let icon = match r.status {
        CheckStatus::Success => "●",
        CheckStatus::Failure => "✗",
        CheckStatus::Skipped => "○",
    };
    let name = if r.name.trim().is_empty() { UNKNOWN } else { r.name.as_str() };
    let code = r.code.as_deref().map(|c| format!(" {}", c)).unwrap_or_default();

    let _ = writeln!(out, "  [{}/{}] {} {} [{}]{}", n, total, icon, name, r.status, code);
    if r.detail.trim().is_empty() {
        let _ = writeln!(out, "      (no detail)");
    } else {
        for line in r.detail.lines() {
            let _ = writeln!(out, "      {}", line);
        }
    }
}

/// 固定顺序的汇总行；找不到或无法解读的结果显示 Unknown
pub fn summary(report: &DiagnosticReport) -> Vec<SummaryLine> {
    report.summary_order.iter()
        .enumerate()
        .map(|(i, label)| SummaryLine {
            index: i + 1,
            label: label.clone(),
            value: summary_value(report.find(label)),
        })
        .collect()
}

fn summary_value(result: Option<&CheckResult>) -> String {
    let Some(r) = result else {
        return UNKNOWN.to_string();
    };
    match (r.code.as_deref().map(str::trim), r.status) {
        (Some(code), _) if !code.is_empty() => code.to_string(),
        (_, CheckStatus::Failure) => "Failed".to_string(),
        _ => UNKNOWN.to_string(),
    }
}

fn section(out: &mut String, title: &str) {
    let _ = writeln!(out, "\n{}", "─".repeat(60));
    let _ = writeln!(out, "  {}", title);
    let _ = writeln!(out, "{}", "─".repeat(60));
}
