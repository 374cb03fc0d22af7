use std::time::Duration;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum DiagError {
    /// 外部工具无法调用（二进制缺失、权限不足、daemon 不可达）
    #[error("tool unavailable: {0}")]
    ToolUnavailable(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("timed out after {}ms", .0.as_millis())]
    Timeout(Duration),

    #[error("could not connect: {0}")]
    Unreachable(String),

    #[error("invalid configuration: {0}")]
    ConfigInvalid(String),

    #[error("parse error: {0}")]
    Parse(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, DiagError>;
