pub mod container;
pub mod endpoint;
pub mod hardware;
pub mod logs;
pub mod orchestrator;
pub mod output;
pub mod report;

#[cfg(test)]
pub(crate) mod testing;

use async_trait::async_trait;
use std::sync::Arc;
use tokio::sync::watch;
use tracing::info;

use crate::config::Configuration;
use crate::runtime::{AcceleratorQuery, ContainerRuntime, HttpClient};
use container::{ContainerInspector, Inspection, CONTAINER_STATUS};
use endpoint::EndpointProber;
use hardware::{HardwareProbe, ACCELERATOR};
use logs::{LogCollector, LogSource};
use orchestrator::{Orchestrator, Phase};
use report::{CheckResult, CheckStatus, DiagnosticReport};

/// 一项诊断工作，产出且只产出一个结果；内部错误自行吸收
#[async_trait]
pub trait Checker: Send + Sync {
    fn name(&self) -> &str;
    async fn run(&self) -> CheckResult;
}

/// 加速器被关闭时占位，保证报告里仍有这一行
struct Disabled(&'static str);

#[async_trait]
impl Checker for Disabled {
    fn name(&self) -> &str {
        self.0
    }

    async fn run(&self) -> CheckResult {
        CheckResult::skipped(self.0, "disabled by configuration")
    }
}

const LOG_GROUPS: [&str; 3] = ["Service Logs", "Proxy Access Log", "Proxy Error Log"];

/// 固定检查项的名字；汇总按名字查结果，端点标签不能与之重名
pub fn builtin_names() -> impl Iterator<Item = &'static str> {
    Inspection::all(0)
        .into_iter()
        .map(|i| i.label())
        .chain(LOG_GROUPS)
        .chain(std::iter::once(ACCELERATOR))
}

pub struct Collaborators {
    pub runtime: Arc<dyn ContainerRuntime>,
    pub http: Arc<dyn HttpClient>,
    pub accelerator: Arc<dyn AcceleratorQuery>,
}

// ── 流水线 ──────────────────────────────────────────────────────────────────

/// 固定顺序：容器检查 → 日志 → 端点 → 加速器
pub fn build_pipeline(config: &Configuration, deps: &Collaborators) -> Orchestrator {
    let mut checkers: Vec<Arc<dyn Checker>> = Vec::new();

    for inspector in ContainerInspector::all(
        deps.runtime.clone(),
        &config.container_name,
        &config.service_process,
        config.service_port,
    ) {
        checkers.push(Arc::new(inspector));
    }

    let files = |paths: &[String]| paths.iter().cloned().map(LogSource::File).collect::<Vec<_>>();
    let mut service = vec![LogSource::ContainerOutput];
    service.extend(files(&config.log_paths.service));
    let groups = LOG_GROUPS.into_iter().zip([
        service,
        files(&config.log_paths.proxy_access),
        files(&config.log_paths.proxy_error),
    ]);
    for (label, sources) in groups {
        checkers.push(Arc::new(LogCollector::new(
            deps.runtime.clone(),
            &config.container_name,
            label,
            sources,
            config.tail_lines,
        )));
    }

    for target in &config.targets {
        checkers.push(Arc::new(EndpointProber::new(deps.http.clone(), target.clone())));
    }

    if config.accelerator {
        checkers.push(Arc::new(HardwareProbe::new(deps.accelerator.clone())));
    } else {
        checkers.push(Arc::new(Disabled(ACCELERATOR)));
    }

    Orchestrator::new(checkers, summary_order(config))
        .concurrency(config.concurrency)
        .deadline(config.deadline)
}

/// 汇总区：端点按配置顺序，最后是容器状态
pub fn summary_order(config: &Configuration) -> Vec<String> {
    config.targets.iter()
        .map(|t| t.label.clone())
        .chain(std::iter::once(CONTAINER_STATUS.to_string()))
        .collect()
}

pub async fn run_diagnostics(
    config: &Configuration,
    deps: &Collaborators,
    phase: &mut Phase,
    cancel: watch::Receiver<bool>,
) -> DiagnosticReport {
    let pipeline = build_pipeline(config, deps);
    info!(
        container = %config.container_name,
        host_port = config.host_port,
        production_host = %config.production_host,
        targets = config.targets.len(),
        "running diagnostics"
    );
    let report = pipeline.run(phase, cancel).await;
    info!(
        ok = report.count(CheckStatus::Success),
        failed = report.count(CheckStatus::Failure),
        skipped = report.count(CheckStatus::Skipped),
        "diagnostics finished"
    );
    report
}
