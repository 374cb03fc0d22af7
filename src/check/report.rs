//! 顶层报告结构体

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CheckStatus {
    Success,
    Failure,
    Skipped,
}

impl std::fmt::Display for CheckStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CheckStatus::Success => write!(f, "OK"),
            CheckStatus::Failure => write!(f, "FAIL"),
            CheckStatus::Skipped => write!(f, "SKIP"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckResult {
    pub name: String,
    pub status: CheckStatus,
    pub detail: String,
    pub code: Option<String>,
}

impl CheckResult {
    pub fn success(name: &str, detail: impl Into<String>) -> Self {
        Self::new(name, CheckStatus::Success, detail)
    }

    pub fn failure(name: &str, detail: impl Into<String>) -> Self {
        Self::new(name, CheckStatus::Failure, detail)
    }

    pub fn skipped(name: &str, detail: impl Into<String>) -> Self {
        Self::new(name, CheckStatus::Skipped, detail)
    }

    pub fn with_code(self, code: impl Into<String>) -> Self {
        Self { code: Some(code.into()), ..self }
    }

    fn new(name: &str, status: CheckStatus, detail: impl Into<String>) -> Self {
        Self { name: name.to_string(), status, detail: detail.into(), code: None }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DiagnosticReport {
    pub captured_at: String,
    /// 按调用顺序排列，与完成顺序无关
    pub results: Vec<CheckResult>,
    /// 汇总区要列出的检查名，顺序固定
    pub summary_order: Vec<String>,
}

impl DiagnosticReport {
    pub fn find(&self, name: &str) -> Option<&CheckResult> {
        self.results.iter().find(|r| r.name == name)
    }

    pub fn count(&self, status: CheckStatus) -> usize {
        self.results.iter().filter(|r| r.status == status).count()
    }
}
