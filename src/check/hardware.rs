use async_trait::async_trait;
use std::sync::Arc;

use crate::check::report::CheckResult;
use crate::check::Checker;
use crate::runtime::AcceleratorQuery;

pub const ACCELERATOR: &str = "Accelerator";

/// 单次查询，不重试
pub struct HardwareProbe {
    query: Arc<dyn AcceleratorQuery>,
}

impl HardwareProbe {
    pub fn new(query: Arc<dyn AcceleratorQuery>) -> Self {
        Self { query }
    }
}

#[async_trait]
impl Checker for HardwareProbe {
    fn name(&self) -> &str {
        ACCELERATOR
    }

    async fn run(&self) -> CheckResult {
        match self.query.query_devices().await {
            Ok(summary) => CheckResult::success(ACCELERATOR, summary).with_code("available"),
            Err(e) => CheckResult::failure(ACCELERATOR, format!("could not access accelerator ({})", e))
                .with_code("Not Found"),
        }
    }
}
