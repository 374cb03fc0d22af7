use async_trait::async_trait;
use std::time::Duration;
use tokio::process::Command;

use crate::utils::{DiagError, Result};

#[async_trait]
pub trait AcceleratorQuery: Send + Sync {
    async fn query_devices(&self) -> Result<String>;
}

/// nvidia-smi 查询 GPU 状态
pub struct NvidiaSmi {
    timeout: Duration,
}

impl NvidiaSmi {
    pub fn new(timeout: Duration) -> Self {
        Self { timeout }
    }
}

#[async_trait]
impl AcceleratorQuery for NvidiaSmi {
    async fn query_devices(&self) -> Result<String> {
        let child = Command::new("nvidia-smi")
            .args([
                "--query-gpu=index,name,driver_version,memory.used,memory.total,utilization.gpu",
                "--format=csv,noheader",
            ])
            .kill_on_drop(true)
            .output();

        let out = match tokio::time::timeout(self.timeout, child).await {
            Ok(Ok(out)) => out,
            Ok(Err(e)) => return Err(DiagError::ToolUnavailable(format!("nvidia-smi: {}", e))),
            Err(_) => return Err(DiagError::Timeout(self.timeout)),
        };

        if !out.status.success() {
            let stderr = String::from_utf8_lossy(&out.stderr);
            let stdout = String::from_utf8_lossy(&out.stdout);
            // nvidia-smi 经常把驱动错误写到 stdout
            let msg = if stderr.trim().is_empty() { stdout } else { stderr };
            return Err(DiagError::ToolUnavailable(format!("nvidia-smi: {}", msg.trim())));
        }

        summarize(&String::from_utf8_lossy(&out.stdout))
    }
}

fn summarize(csv: &str) -> Result<String> {
    let devices: Vec<String> = csv.lines()
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .map(|line| {
            let f: Vec<&str> = line.split(',').map(str::trim).collect();
            match f.as_slice() {
                [idx, name, driver, used, total, util] => format!(
                    "GPU {}: {} (driver {}) mem {} / {} util {}",
                    idx, name, driver, used, total, util
                ),
                _ => line.to_string(),
            }
        })
        .collect();

    if devices.is_empty() {
        return Err(DiagError::NotFound("no accelerator devices reported".to_string()));
    }
    Ok(devices.join("\n"))
}
