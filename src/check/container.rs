//! 容器内部检查：状态、进程列表、监听端口、服务进程
//!
//! Each sub-check is its own [`ContainerInspector`] so a failing `docker exec`
//! only affects the row it belongs to.

use async_trait::async_trait;
use std::sync::Arc;

use crate::check::report::CheckResult;
use crate::check::Checker;
use crate::runtime::ContainerRuntime;
use crate::utils::DiagError;

pub const CONTAINER_STATUS: &str = "Container Status";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Inspection {
    Status,
    Processes,
    ListeningPorts { port: u16 },
    ServiceProcess,
}

impl Inspection {
    /// 全部子检查，顺序即报告顺序
    pub fn all(service_port: u16) -> [Inspection; 4] {
        [
            Inspection::Status,
            Inspection::Processes,
            Inspection::ListeningPorts { port: service_port },
            Inspection::ServiceProcess,
        ]
    }

    pub fn label(&self) -> &'static str {
        match self {
            Inspection::Status => CONTAINER_STATUS,
            Inspection::Processes => "Process List",
            Inspection::ListeningPorts { .. } => "Listening Ports",
            Inspection::ServiceProcess => "Service Process",
        }
    }
}

pub struct ContainerInspector {
    runtime: Arc<dyn ContainerRuntime>,
    container: String,
    service_process: String,
    inspection: Inspection,
}

impl ContainerInspector {
    pub fn new(
        runtime: Arc<dyn ContainerRuntime>,
        container: &str,
        service_process: &str,
        inspection: Inspection,
    ) -> Self {
        Self {
            runtime,
            container: container.to_string(),
            service_process: service_process.to_string(),
            inspection,
        }
    }

    pub fn all(
        runtime: Arc<dyn ContainerRuntime>,
        container: &str,
        service_process: &str,
        service_port: u16,
    ) -> Vec<Self> {
        Inspection::all(service_port)
            .into_iter()
            .map(|i| Self::new(runtime.clone(), container, service_process, i))
            .collect()
    }

    async fn status(&self) -> CheckResult {
        let name = self.name();
        match self.runtime.inspect(&self.container).await {
            Ok(state) => {
                let shown = if state.name.is_empty() { &self.container } else { &state.name };
                let mut detail = format!("{} is {}", shown, state.status);
                if state.is_running() {
                    detail.push_str(&format!(" (started {}, restarts {})",
                        state.started_at, state.restart_count));
                    CheckResult::success(name, detail).with_code(state.status)
                } else {
                    detail.push_str(&format!(" (exit={}{})", state.exit_code,
                        if state.oom_killed { ", OOM-killed" } else { "" }));
                    CheckResult::failure(name, detail).with_code(state.status)
                }
            }
            Err(e @ DiagError::NotFound(_)) => CheckResult::failure(name, e.to_string()).with_code("Not Found"),
            Err(e) => CheckResult::failure(name, e.to_string()).with_code("Failed"),
        }
    }

    async fn processes(&self) -> CheckResult {
        let name = self.name();
        match self.runtime.exec(&self.container, &["ps", "aux"]).await {
            Ok(out) if out.success() => CheckResult::success(name, out.stdout.trim_end()),
            Ok(out) => CheckResult::failure(name, format!("ps exited with {}: {}", out.exit_code, out.stderr)),
            Err(e) => CheckResult::failure(name, e.to_string()),
        }
    }

    async fn listening_ports(&self, port: u16) -> CheckResult {
        let name = self.name();

        // 精简镜像里 ss 和 netstat 往往只有一个
        let mut listing = None;
        let mut last_err = String::new();
        for cmd in [["ss", "-tlnp"], ["netstat", "-tlnp"]] {
            match self.runtime.exec(&self.container, &cmd).await {
                Ok(out) if out.success() => {
                    listing = Some(out.stdout);
                    break;
                }
                Ok(out) => last_err = format!("{} exited with {}: {}", cmd[0], out.exit_code, out.stderr),
                Err(e) => return CheckResult::failure(name, e.to_string()),
            }
        }

        let Some(listing) = listing else {
            return CheckResult::failure(name, format!("no socket listing tool available ({})", last_err));
        };

        let needle = format!(":{}", port);
        let listening = listing.lines().any(|l| {
            l.split_whitespace().any(|field| field.ends_with(&needle))
        });
        let detail = listing.trim_end().to_string();
        if listening {
            CheckResult::success(name, detail).with_code("listening")
        } else {
            CheckResult::failure(name, format!("nothing listening on port {}\n{}", port, detail))
                .with_code("Not Listening")
        }
    }

    async fn service_process(&self) -> CheckResult {
        let name = self.name();
        let out = match self.runtime.exec(&self.container, &["ps", "-eo", "pid,args"]).await {
            Ok(out) if out.success() => out,
            Ok(out) => {
                return CheckResult::failure(name, format!("ps exited with {}: {}", out.exit_code, out.stderr))
            }
            Err(e) => return CheckResult::failure(name, e.to_string()),
        };

        let matches = find_process(&out.stdout, &self.service_process);
        if matches.is_empty() {
            CheckResult::failure(name, format!("no {} process running", self.service_process))
                .with_code("Not Found")
        } else {
            CheckResult::success(name, matches.join("\n")).with_code("present")
        }
    }
}

#[async_trait]
impl Checker for ContainerInspector {
    fn name(&self) -> &str {
        self.inspection.label()
    }

    async fn run(&self) -> CheckResult {
        match self.inspection {
            Inspection::Status => self.status().await,
            Inspection::Processes => self.processes().await,
            Inspection::ListeningPorts { port } => self.listening_ports(port).await,
            Inspection::ServiceProcess => self.service_process().await,
        }
    }
}

/// 从 `ps -eo pid,args` 输出中找出命令名匹配的行（跳过表头）
fn find_process(ps: &str, process: &str) -> Vec<String> {
    ps.lines()
        .skip(1)
        .map(str::trim)
        .filter(|line| {
            line.split_whitespace()
                .nth(1)
                .map(|cmd| cmd.rsplit('/').next().unwrap_or(cmd) == process)
                .unwrap_or(false)
        })
        .map(String::from)
        .collect()
}
