//! 容器运行时接口
//! 来源：docker inspect / docker exec / docker logs

use async_trait::async_trait;
use std::process::Output;
use std::time::Duration;
use tokio::process::Command;
use tracing::debug;

use crate::utils::{DiagError, Result};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecOutput {
    pub stdout: String,
    pub stderr: String,
    pub exit_code: i32,
}

impl ExecOutput {
    pub fn success(&self) -> bool {
        self.exit_code == 0
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContainerState {
    pub name: String,
    pub status: String,       // running / exited / paused / restarting ...
    pub started_at: String,
    pub restart_count: i64,
    pub exit_code: i64,
    pub oom_killed: bool,
}

impl ContainerState {
    pub fn is_running(&self) -> bool {
        self.status == "running"
    }
}

#[async_trait]
pub trait ContainerRuntime: Send + Sync {
    async fn exec(&self, container: &str, command: &[&str]) -> Result<ExecOutput>;
    async fn inspect(&self, container: &str) -> Result<ContainerState>;
    async fn logs(&self, container: &str, tail_lines: usize) -> Result<String>;
}

// ── docker CLI ──────────────────────────────────────────────────────────────

pub struct DockerCli {
    binary: String,
    timeout: Duration,
}

impl DockerCli {
    pub fn new(timeout: Duration) -> Self {
        Self { binary: "docker".to_string(), timeout }
    }

    async fn docker(&self, args: &[&str]) -> Result<Output> {
        debug!(binary = %self.binary, ?args, "invoking container runtime");
        let child = Command::new(&self.binary)
            .args(args)
            .kill_on_drop(true)
            .output();

        match tokio::time::timeout(self.timeout, child).await {
            Ok(Ok(out)) => Ok(out),
            Ok(Err(e)) => Err(DiagError::ToolUnavailable(format!("{} {}: {}", self.binary, args[0], e))),
            Err(_) => Err(DiagError::Timeout(self.timeout)),
        }
    }
}

#[async_trait]
impl ContainerRuntime for DockerCli {
    async fn exec(&self, container: &str, command: &[&str]) -> Result<ExecOutput> {
        let mut args = vec!["exec", container];
        args.extend_from_slice(command);
        let out = self.docker(&args).await?;

        let stderr = String::from_utf8_lossy(&out.stderr).trim().to_string();
        // docker exec 自身失败（容器不存在 / 未运行）与命令失败需要区分
        if let Some(err) = classify_daemon_error(container, &stderr) {
            return Err(err);
        }

        Ok(ExecOutput {
            stdout: String::from_utf8_lossy(&out.stdout).to_string(),
            stderr,
            exit_code: out.status.code().unwrap_or(-1),
        })
    }

    async fn inspect(&self, container: &str) -> Result<ContainerState> {
        let out = self.docker(&["inspect", container]).await?;
        let stderr = String::from_utf8_lossy(&out.stderr);

        if !out.status.success() {
            return Err(classify_daemon_error(container, &stderr).unwrap_or_else(|| {
                DiagError::ToolUnavailable(format!("docker inspect failed: {}", stderr.trim()))
            }));
        }

        parse_inspect(&out.stdout)
    }

    async fn logs(&self, container: &str, tail_lines: usize) -> Result<String> {
        let tail = tail_lines.to_string();
        let out = self.docker(&["logs", "--tail", &tail, container]).await?;

        if !out.status.success() {
            let stderr = String::from_utf8_lossy(&out.stderr);
            return Err(classify_daemon_error(container, &stderr).unwrap_or_else(|| {
                DiagError::ToolUnavailable(format!("docker logs failed: {}", stderr.trim()))
            }));
        }

        // docker logs 会把容器的 stderr 写到 stderr
        let combined = [out.stdout.as_slice(), out.stderr.as_slice()].concat();
        Ok(String::from_utf8_lossy(&combined).to_string())
    }
}

// ── 解析 ────────────────────────────────────────────────────────────────────

fn classify_daemon_error(container: &str, stderr: &str) -> Option<DiagError> {
    if stderr.contains("No such container") || stderr.contains("No such object") {
        Some(DiagError::NotFound(format!("container {}", container)))
    } else if stderr.contains("is not running") {
        Some(DiagError::NotFound(format!("container {} is not running", container)))
    } else if stderr.contains("Cannot connect to the Docker daemon")
        || stderr.contains("permission denied while trying to connect")
    {
        Some(DiagError::ToolUnavailable(stderr.trim().to_string()))
    } else {
        None
    }
}

fn parse_inspect(raw: &[u8]) -> Result<ContainerState> {
    let arr: serde_json::Value = serde_json::from_slice(raw)
        .map_err(|e| DiagError::Parse(format!("inspect JSON: {}", e)))?;

    let c = arr.as_array()
        .and_then(|a| a.first())
        .ok_or_else(|| DiagError::Parse("empty inspect result".to_string()))?;

    let state = &c["State"];
    Ok(ContainerState {
        name: c["Name"].as_str().unwrap_or("").trim_start_matches('/').to_string(),
        status: state["Status"].as_str().unwrap_or("unknown").to_string(),
        started_at: state["StartedAt"].as_str().unwrap_or("").to_string(),
        restart_count: c["RestartCount"].as_i64().unwrap_or(0),
        exit_code: state["ExitCode"].as_i64().unwrap_or(0),
        oom_killed: state["OOMKilled"].as_bool().unwrap_or(false),
    })
}
