//! 调度：有界并发执行所有检查，结果按调用顺序落入预分配槽位
//!
//! Every checker yields exactly one [`CheckResult`]. A panic becomes a
//! `Failure`; when the run deadline or a cancellation fires, checkers that had
//! started are recorded as `Failure` and those that never started as `Skipped`.

use futures::FutureExt;
use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{watch, Semaphore};
use tokio::task::JoinSet;
use tracing::{debug, warn};

use crate::check::endpoint::FAILED;
use crate::check::report::{CheckResult, DiagnosticReport};
use crate::check::Checker;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Phase {
    Init,
    RunningChecks,
    Aggregating,
    Reporting,
    Done,
}

impl Phase {
    /// 只能前进
    pub fn advance(&mut self, next: Phase) {
        debug_assert!(next > *self, "phase must move forward: {:?} -> {:?}", self, next);
        debug!(from = ?*self, to = ?next, "phase transition");
        *self = next;
    }
}

pub struct Orchestrator {
    checkers: Vec<Arc<dyn Checker>>,
    summary_order: Vec<String>,
    concurrency: usize,
    deadline: Option<Duration>,
}

impl Orchestrator {
    pub fn new(checkers: Vec<Arc<dyn Checker>>, summary_order: Vec<String>) -> Self {
        Self { checkers, summary_order, concurrency: 1, deadline: None }
    }

    pub fn concurrency(mut self, n: usize) -> Self {
        self.concurrency = n.max(1);
        self
    }

    pub fn deadline(mut self, deadline: Option<Duration>) -> Self {
        self.deadline = deadline;
        self
    }

    /// `cancel` 变为 true 时提前结束；发送端被丢弃则视为永不取消
    pub async fn run(&self, phase: &mut Phase, mut cancel: watch::Receiver<bool>) -> DiagnosticReport {
        phase.advance(Phase::RunningChecks);

        let total = self.checkers.len();
        let mut slots: Vec<Option<CheckResult>> = vec![None; total];
        let started: Arc<Vec<AtomicBool>> = Arc::new((0..total).map(|_| AtomicBool::new(false)).collect());
        let pool = Arc::new(Semaphore::new(self.concurrency));
        let mut set = JoinSet::new();

        for (idx, checker) in self.checkers.iter().enumerate() {
            let checker = Arc::clone(checker);
            let started = Arc::clone(&started);
            let pool = Arc::clone(&pool);
            set.spawn(async move {
                let _permit = pool.acquire_owned().await;
                started[idx].store(true, Ordering::SeqCst);

                let result = match AssertUnwindSafe(checker.run()).catch_unwind().await {
                    Ok(result) => result,
                    Err(panic) => CheckResult::failure(
                        checker.name(),
                        format!("checker panicked: {}", panic_message(&*panic)),
                    )
                    .with_code(FAILED),
                };
                (idx, result)
            });
        }

        let expiry = async {
            match self.deadline {
                Some(d) => tokio::time::sleep(d).await,
                None => std::future::pending::<()>().await,
            }
        };
        tokio::pin!(expiry);

        let mut interrupted: Option<&'static str> = None;
        while !set.is_empty() {
            tokio::select! {
                joined = set.join_next() => match joined {
                    Some(Ok((idx, result))) => {
                        debug!(check = %result.name, status = ?result.status, "check finished");
                        slots[idx] = Some(result);
                    }
                    Some(Err(e)) => warn!(error = %e, "check task did not complete"),
                    None => break,
                },
                _ = &mut expiry => {
                    warn!(deadline = ?self.deadline, "run deadline expired");
                    interrupted = Some("timed out");
                    break;
                }
                _ = cancelled(&mut cancel) => {
                    warn!("run cancelled");
                    interrupted = Some("cancelled");
                    break;
                }
            }
        }
        set.abort_all();

        phase.advance(Phase::Aggregating);

        let results = slots.into_iter()
            .enumerate()
            .map(|(idx, slot)| slot.unwrap_or_else(|| {
                let name = self.checkers[idx].name();
                let reason = interrupted.unwrap_or("no result");
                if started[idx].load(Ordering::SeqCst) {
                    CheckResult::failure(name, reason).with_code(FAILED)
                } else {
                    CheckResult::skipped(name, format!("not started ({})", reason))
                }
            }))
            .collect();

        DiagnosticReport {
            captured_at: chrono::Local::now().format("%Y-%m-%d %H:%M:%S %z").to_string(),
            results,
            summary_order: self.summary_order.clone(),
        }
    }
}

async fn cancelled(rx: &mut watch::Receiver<bool>) {
    loop {
        if *rx.borrow_and_update() {
            return;
        }
        if rx.changed().await.is_err() {
            std::future::pending::<()>().await;
        }
    }
}

fn panic_message(panic: &(dyn std::any::Any + Send)) -> String {
    panic.downcast_ref::<&str>()
        .map(|s| s.to_string())
        .or_else(|| panic.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "unknown panic".to_string())
}
