//! HTTP 端点探测
//!
//! Any HTTP response counts as a successful probe; the status code is the
//! result. Only a failed connection or an elapsed timeout is a `Failure`.

use async_trait::async_trait;
use std::sync::Arc;
use tracing::debug;

use crate::check::report::CheckResult;
use crate::check::Checker;
use crate::config::ProbeTarget;
use crate::runtime::HttpClient;
use crate::utils::DiagError;

pub const FAILED: &str = "Failed";

pub struct EndpointProber {
    client: Arc<dyn HttpClient>,
    target: ProbeTarget,
}

impl EndpointProber {
    pub fn new(client: Arc<dyn HttpClient>, target: ProbeTarget) -> Self {
        Self { client, target }
    }
}

#[async_trait]
impl Checker for EndpointProber {
    fn name(&self) -> &str {
        &self.target.label
    }

    async fn run(&self) -> CheckResult {
        let t = &self.target;
        let timeout = t.timeout();
        debug!(label = %t.label, url = %t.url, timeout_ms = t.timeout_ms, "probing endpoint");

        // 客户端自己也有超时，这里再兜一层，保证不会无限阻塞
        let outcome = match tokio::time::timeout(timeout, self.client.get(&t.url, timeout)).await {
            Ok(r) => r,
            Err(_) => Err(DiagError::Timeout(timeout)),
        };

        match outcome {
            Ok(code) => CheckResult::success(
                &t.label,
                format!("GET {} -> server responded with HTTP {}", t.url, describe_status(code)),
            )
            .with_code(code.to_string()),
            Err(e @ DiagError::Timeout(_)) => {
                CheckResult::failure(&t.label, format!("GET {} -> no response: {}", t.url, e)).with_code(FAILED)
            }
            Err(e) => {
                CheckResult::failure(&t.label, format!("GET {} -> {}", t.url, e)).with_code(FAILED)
            }
        }
    }
}

fn describe_status(code: u16) -> String {
    reqwest::StatusCode::from_u16(code)
        .ok()
        .and_then(|s| s.canonical_reason())
        .map(|reason| format!("{} {}", code, reason))
        .unwrap_or_else(|| code.to_string())
}
