//! 日志尾部收集：容器输出 + 容器内的日志文件
//! 来源：docker logs --tail / docker exec tail -n

use async_trait::async_trait;
use std::sync::Arc;

use crate::check::report::CheckResult;
use crate::check::Checker;
use crate::runtime::ContainerRuntime;
use crate::utils::DiagError;

const NOT_FOUND: &str = "(not found)";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LogSource {
    /// 容器自身的 stdout/stderr
    ContainerOutput,
    File(String),
}

impl std::fmt::Display for LogSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LogSource::ContainerOutput => write!(f, "container output"),
            LogSource::File(p) => write!(f, "{}", p),
        }
    }
}

enum Tailed {
    Content(String),
    Missing,
    Unavailable(String),
}

pub struct LogCollector {
    runtime: Arc<dyn ContainerRuntime>,
    container: String,
    label: String,
    sources: Vec<LogSource>,
    max_lines: usize,
}

impl LogCollector {
    pub fn new(
        runtime: Arc<dyn ContainerRuntime>,
        container: &str,
        label: &str,
        sources: Vec<LogSource>,
        max_lines: usize,
    ) -> Self {
        Self {
            runtime,
            container: container.to_string(),
            label: label.to_string(),
            sources,
            // 至少一行，避免无界输出的 0 语义
            max_lines: max_lines.max(1),
        }
    }

    async fn tail(&self, source: &LogSource) -> Tailed {
        let result = match source {
            LogSource::ContainerOutput => self.runtime.logs(&self.container, self.max_lines).await,
            LogSource::File(path) => {
                let n = self.max_lines.to_string();
                match self.runtime.exec(&self.container, &["tail", "-n", &n, path]).await {
                    Ok(out) if out.success() => Ok(out.stdout),
                    Ok(_) => return Tailed::Missing,
                    Err(e) => Err(e),
                }
            }
        };

        match result {
            Ok(text) => Tailed::Content(last_lines(&text, self.max_lines)),
            Err(DiagError::NotFound(_)) => Tailed::Missing,
            Err(e) => Tailed::Unavailable(e.to_string()),
        }
    }
}

#[async_trait]
impl Checker for LogCollector {
    fn name(&self) -> &str {
        &self.label
    }

    async fn run(&self) -> CheckResult {
        if self.sources.is_empty() {
            return CheckResult::skipped(&self.label, "no log sources configured");
        }

        let mut sections = Vec::with_capacity(self.sources.len());
        let mut found = 0;
        let mut unavailable = 0;

        for source in &self.sources {
            let body = match self.tail(source).await {
                Tailed::Content(text) => {
                    found += 1;
                    if text.is_empty() { "(empty)".to_string() } else { text }
                }
                Tailed::Missing => NOT_FOUND.to_string(),
                Tailed::Unavailable(err) => {
                    unavailable += 1;
                    format!("(unavailable: {})", err)
                }
            };
            sections.push(format!("==> {} <==\n{}", source, body));
        }

        let detail = sections.join("\n");
        if found > 0 {
            CheckResult::success(&self.label, detail)
        } else if unavailable == self.sources.len() {
            CheckResult::failure(&self.label, detail)
        } else {
            CheckResult::skipped(&self.label, detail)
        }
    }
}

fn last_lines(text: &str, n: usize) -> String {
    let lines: Vec<&str> = text.lines().collect();
    let start = lines.len().saturating_sub(n);
    lines[start..].join("\n")
}
