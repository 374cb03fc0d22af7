//! 测试用的假协作者，不碰 docker 也不走网络

use async_trait::async_trait;
use std::collections::HashMap;
use std::time::Duration;

use crate::check::report::CheckResult;
use crate::check::Checker;
use crate::runtime::container::{ContainerState, ExecOutput};
use crate::runtime::{AcceleratorQuery, ContainerRuntime, HttpClient};
use crate::utils::{DiagError, Result};

// ── 容器运行时 ──────────────────────────────────────────────────────────────

#[derive(Clone, Default)]
pub struct FakeRuntime {
    state: Option<ContainerState>,
    unavailable: bool,
    replies: HashMap<String, ExecOutput>,
    files: HashMap<String, String>,
    logs: String,
}

impl FakeRuntime {
    pub fn running() -> Self {
        Self::with_status("running")
            .exec_reply("ps", 0, "PID COMMAND\n    1 node server.js\n", "")
            .exec_reply("ss", 0, "State Recv-Q Send-Q Local Address:Port\nLISTEN 0 511 0.0.0.0:4000 0.0.0.0:*\n", "")
    }

    pub fn with_status(status: &str) -> Self {
        Self {
            state: Some(ContainerState {
                name: "app".to_string(),
                status: status.to_string(),
                started_at: "2024-05-01T10:00:00Z".to_string(),
                restart_count: 0,
                exit_code: if status == "running" { 0 } else { 137 },
                oom_killed: false,
            }),
            ..Default::default()
        }
    }

    pub fn missing() -> Self {
        Self::default()
    }

    pub fn unavailable() -> Self {
        Self { unavailable: true, ..Default::default() }
    }

    pub fn exec_reply(mut self, program: &str, exit_code: i32, stdout: &str, stderr: &str) -> Self {
        self.replies.insert(program.to_string(), ExecOutput {
            stdout: stdout.to_string(),
            stderr: stderr.to_string(),
            exit_code,
        });
        self
    }

    pub fn file(mut self, path: &str, contents: &str) -> Self {
        self.files.insert(path.to_string(), contents.to_string());
        self
    }

    pub fn logs(mut self, logs: &str) -> Self {
        self.logs = logs.to_string();
        self
    }

    fn reachable(&self, container: &str) -> Result<&ContainerState> {
        if self.unavailable {
            return Err(DiagError::ToolUnavailable("docker: No such file or directory".to_string()));
        }
        self.state.as_ref().ok_or_else(|| DiagError::NotFound(format!("container {}", container)))
    }
}

#[async_trait]
impl ContainerRuntime for FakeRuntime {
    async fn exec(&self, container: &str, command: &[&str]) -> Result<ExecOutput> {
        if !self.reachable(container)?.is_running() {
            return Err(DiagError::NotFound(format!("container {} is not running", container)));
        }

        if command.first() == Some(&"tail") {
            let path = command.last().copied().unwrap_or_default();
            return Ok(match self.files.get(path) {
                Some(contents) => ExecOutput { stdout: contents.clone(), stderr: String::new(), exit_code: 0 },
                None => ExecOutput {
                    stdout: String::new(),
                    stderr: format!("tail: cannot open '{}' for reading: No such file or directory", path),
                    exit_code: 1,
                },
            });
        }

        let program = command.first().copied().unwrap_or_default();
        Ok(self.replies.get(program).cloned().unwrap_or(ExecOutput {
            stdout: String::new(),
            stderr: format!("sh: {}: not found", program),
            exit_code: 127,
        }))
    }

    async fn inspect(&self, container: &str) -> Result<ContainerState> {
        self.reachable(container).cloned()
    }

    async fn logs(&self, container: &str, _tail_lines: usize) -> Result<String> {
        self.reachable(container)?;
        Ok(self.logs.clone())
    }
}

// ── HTTP ────────────────────────────────────────────────────────────────────

#[derive(Clone)]
enum Reply {
    Status(u16),
    Refused,
    Hang,
}

#[derive(Clone, Default)]
pub struct FakeHttp {
    replies: HashMap<String, Reply>,
}

impl FakeHttp {
    pub fn respond(mut self, url: &str, code: u16) -> Self {
        self.replies.insert(url.to_string(), Reply::Status(code));
        self
    }

    pub fn refuse(mut self, url: &str) -> Self {
        self.replies.insert(url.to_string(), Reply::Refused);
        self
    }

    pub fn hang(mut self, url: &str) -> Self {
        self.replies.insert(url.to_string(), Reply::Hang);
        self
    }
}

#[async_trait]
impl HttpClient for FakeHttp {
    async fn get(&self, url: &str, _timeout: Duration) -> Result<u16> {
        match self.replies.get(url).cloned().unwrap_or(Reply::Refused) {
            Reply::Status(code) => Ok(code),
            Reply::Refused => Err(DiagError::Unreachable(format!(
                "error trying to connect: tcp connect error: Connection refused (os error 111) [{}]",
                url
            ))),
            // 故意不理会超时参数，由调用方负责截断
            Reply::Hang => {
                tokio::time::sleep(Duration::from_secs(3600)).await;
                Ok(200)
            }
        }
    }
}

// ── 加速器 ──────────────────────────────────────────────────────────────────

pub enum FakeAccelerator {
    Devices(String),
    Missing,
}

#[async_trait]
impl AcceleratorQuery for FakeAccelerator {
    async fn query_devices(&self) -> Result<String> {
        match self {
            FakeAccelerator::Devices(s) => Ok(s.clone()),
            FakeAccelerator::Missing => Err(DiagError::ToolUnavailable(
                "nvidia-smi: No such file or directory (os error 2)".to_string(),
            )),
        }
    }
}

// ── 脚本化检查 ──────────────────────────────────────────────────────────────

enum Outcome {
    Ok,
    Fail,
    Panic,
}

pub struct Scripted {
    name: String,
    outcome: Outcome,
    delay: Duration,
}

impl Scripted {
    pub fn ok(name: &str) -> Self {
        Self::new(name, Outcome::Ok)
    }

    pub fn fail(name: &str) -> Self {
        Self::new(name, Outcome::Fail)
    }

    pub fn panics(name: &str) -> Self {
        Self::new(name, Outcome::Panic)
    }

    pub fn delay(mut self, ms: u64) -> Self {
        self.delay = Duration::from_millis(ms);
        self
    }

    fn new(name: &str, outcome: Outcome) -> Self {
        Self { name: name.to_string(), outcome, delay: Duration::ZERO }
    }
}

#[async_trait]
impl Checker for Scripted {
    fn name(&self) -> &str {
        &self.name
    }

    async fn run(&self) -> CheckResult {
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        match self.outcome {
            Outcome::Ok => CheckResult::success(&self.name, "ok"),
            Outcome::Fail => CheckResult::failure(&self.name, "failed on purpose"),
            Outcome::Panic => panic!("boom"),
        }
    }
}
