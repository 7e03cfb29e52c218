#![allow(dead_code)]

use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use jobvisor::{ChildTask, Fault, Job, JobError, JobRef, Subscribe, Terminal};
use tokio::sync::oneshot;

pub const LIMIT: Duration = Duration::from_secs(5);

/// Deferred child that finishes with whatever is sent through the returned gate.
pub fn gated(label: &str) -> (oneshot::Sender<Result<u32, Fault>>, JobRef<u32>) {
    let (tx, rx) = oneshot::channel();
    let job = ChildTask::deferred(label.to_string(), move |_| async move {
        rx.await.unwrap_or_else(|_| Err(Fault::message("gate dropped")))
    });
    (tx, job.into_ref())
}

/// Deferred child that only ends when stopped.
pub fn endless(label: &str) -> JobRef<u32> {
    ChildTask::deferred(label.to_string(), |scope| async move {
        scope.cancelled().await;
        Err::<u32, _>(Fault::from(JobError::Stopped))
    })
    .into_ref()
}

/// Deferred child that raises `launched` when its work is started.
pub fn tracked(label: &str, launched: &Arc<AtomicBool>) -> JobRef<u32> {
    let launched = Arc::clone(launched);
    ChildTask::deferred(label.to_string(), move |_| {
        launched.store(true, Ordering::SeqCst);
        async { Ok::<_, Fault>(0u32) }
    })
    .into_ref()
}

pub async fn eventually(what: &str, cond: impl Fn() -> bool) {
    let waited = tokio::time::timeout(LIMIT, async {
        while !cond() {
            tokio::time::sleep(Duration::from_millis(2)).await;
        }
    })
    .await;
    assert!(waited.is_ok(), "timed out waiting for {what}");
}

pub async fn within<F: Future>(fut: F) -> F::Output {
    tokio::time::timeout(LIMIT, fut).await.expect("timed out")
}

/// Rich subscriber recording everything it sees as text.
#[derive(Default)]
pub struct Transcript {
    pub lines: Mutex<Vec<String>>,
    pub terminals: Mutex<Vec<Terminal>>,
}

impl Transcript {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn lines(&self) -> Vec<String> {
        self.lines.lock().unwrap().clone()
    }

    pub fn terminals(&self) -> Vec<Terminal> {
        self.terminals.lock().unwrap().clone()
    }

    fn push(&self, line: String) {
        self.lines.lock().unwrap().push(line);
    }
}

impl Subscribe<u32> for Transcript {
    fn on_payload(&self, value: &u32) {
        self.push(format!("payload:{value}"));
    }
    fn on_error(&self, error: &JobError) {
        self.push(format!("error:{error}"));
    }
    fn on_warning(&self, message: &str) {
        self.push(format!("warning:{message}"));
    }
    fn on_verbose(&self, message: &str) {
        self.push(format!("verbose:{message}"));
    }
    fn on_debug(&self, message: &str) {
        self.push(format!("debug:{message}"));
    }
    fn on_progress(&self, progress: &jobvisor::ProgressRecord) {
        self.push(format!("progress:{}", progress.activity));
    }
    fn on_information(&self, info: &jobvisor::InformationRecord) {
        self.push(format!("information:{}", info.message));
    }
    fn on_terminal(&self, terminal: &Terminal) {
        self.terminals.lock().unwrap().push(terminal.clone());
    }
}
