//! HTTP 客户端接口

use async_trait::async_trait;
use std::time::Duration;

use crate::utils::{DiagError, Result};

#[async_trait]
pub trait HttpClient: Send + Sync {
    /// 返回响应状态码；任何状态码都算收到响应
    async fn get(&self, url: &str, timeout: Duration) -> Result<u16>;
}

pub struct ReqwestClient {
    client: reqwest::Client,
}

impl ReqwestClient {
    pub fn new() -> Result<Self> {
        let client = reqwest::Client::builder()
            .redirect(reqwest::redirect::Policy::none())
            .no_proxy()
            .user_agent(concat!("svcdiag/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| DiagError::ToolUnavailable(format!("HTTP client: {}", e)))?;
        Ok(Self { client })
    }
}

#[async_trait]
impl HttpClient for ReqwestClient {
    async fn get(&self, url: &str, timeout: Duration) -> Result<u16> {
        let request = self.client.get(url).timeout(timeout).send();

        match tokio::time::timeout(timeout, request).await {
            Ok(Ok(resp)) => Ok(resp.status().as_u16()),
            Ok(Err(e)) if e.is_timeout() => Err(DiagError::Timeout(timeout)),
            Ok(Err(e)) => Err(DiagError::Unreachable(error_chain(&e))),
            Err(_) => Err(DiagError::Timeout(timeout)),
        }
    }
}

/// reqwest 的顶层错误信息很笼统，拼上 source 链
fn error_chain(e: &(dyn std::error::Error + 'static)) -> String {
    let mut msg = e.to_string();
    let mut cur = e.source();
    while let Some(src) = cur {
        let s = src.to_string();
        if !msg.contains(&s) {
            msg.push_str(": ");
            msg.push_str(&s);
        }
        cur = src.source();
    }
    msg
}
