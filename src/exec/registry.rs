// src/exec/registry.rs

//! Tracking of asynchronously started processes.

use std::collections::HashMap;

use anyhow::{Context, Result};
use tokio::process::{Child, Command};
use tokio::sync::{oneshot, watch, Mutex};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

/// Handle for a started process.
///
/// - `cancel` asks the supervising task to kill the child.
/// - `handle` is the tokio task waiting on the child.
struct ActiveProcess {
    pid: Option<u32>,
    cancel: Option<oneshot::Sender<()>>,
    handle: JoinHandle<()>,
}

/// Started processes keyed by command identity.
///
/// At most one live process exists per identity: [`replace`] stops the
/// previous one and waits for it to exit before spawning the new one.
///
/// [`replace`]: ProcessRegistry::replace
pub struct ProcessRegistry {
    active: Mutex<HashMap<String, ActiveProcess>>,
    running: watch::Sender<usize>,
}

impl Default for ProcessRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl ProcessRegistry {
    pub fn new() -> Self {
        let (running, _) = watch::channel(0);
        Self {
            active: Mutex::new(HashMap::new()),
            running,
        }
    }

    /// Stop any process registered under `identity`, then spawn `command`
    /// and register it. Returns the new pid, if the OS reported one.
    pub async fn replace(&self, identity: &str, mut command: Command) -> Result<Option<u32>> {
        let mut active = self.active.lock().await;

        if let Some(previous) = active.remove(identity) {
            stop(identity, previous).await;
        }

        command.kill_on_drop(true);
        let child = command
            .spawn()
            .with_context(|| format!("starting \"{identity}\""))?;
        let pid = child.id();

        let (cancel_tx, cancel_rx) = oneshot::channel::<()>();
        self.running.send_modify(|n| *n += 1);
        let handle = tokio::spawn(supervise(
            identity.to_string(),
            child,
            cancel_rx,
            self.running.clone(),
        ));

        info!(cmd = %identity, pid, "process started");
        active.insert(
            identity.to_string(),
            ActiveProcess {
                pid,
                cancel: Some(cancel_tx),
                handle,
            },
        );
        Ok(pid)
    }

    /// Kill every tracked process.
    pub async fn kill_all(&self) {
        let mut active = self.active.lock().await;
        for (identity, process) in active.drain() {
            stop(&identity, process).await;
        }
    }

    /// Wait until every started process has exited.
    pub async fn wait(&self) {
        let mut rx = self.running.subscribe();
        // The sender lives as long as `self`.
        let _ = rx.wait_for(|n| *n == 0).await;
    }

    /// Number of processes currently running.
    pub fn running(&self) -> usize {
        *self.running.borrow()
    }

    /// Identities and pids of processes that are still running.
    pub async fn pids(&self) -> Vec<(String, u32)> {
        let active = self.active.lock().await;
        let mut pids: Vec<(String, u32)> = active
            .iter()
            .filter(|(_, p)| !p.handle.is_finished())
            .filter_map(|(id, p)| p.pid.map(|pid| (id.clone(), pid)))
            .collect();
        pids.sort();
        pids
    }

    pub async fn is_tracked(&self, identity: &str) -> bool {
        let active = self.active.lock().await;
        active
            .get(identity)
            .is_some_and(|p| !p.handle.is_finished())
    }
}

async fn stop(identity: &str, mut process: ActiveProcess) {
    if process.handle.is_finished() {
        debug!(cmd = %identity, "previous process already exited");
        return;
    }

    info!(cmd = %identity, pid = process.pid, "killing previous process");
    if let Some(cancel) = process.cancel.take() {
        if cancel.send(()).is_err() {
            debug!(cmd = %identity, "previous process finished while cancelling");
        }
    }
    if let Err(err) = (&mut process.handle).await {
        error!(cmd = %identity, error = %err, "process supervisor task failed");
    }
}

/// Wait for `child` to exit or for a cancellation request, whichever comes
/// first.
async fn supervise(
    identity: String,
    mut child: Child,
    mut cancel_rx: oneshot::Receiver<()>,
    running: watch::Sender<usize>,
) {
    tokio::select! {
        status = child.wait() => match status {
            Ok(status) if status.success() => info!(cmd = %identity, "process exited"),
            Ok(status) => warn!(
                cmd = %identity,
                exit_code = status.code().unwrap_or(-1),
                "process exited with failure"
            ),
            Err(err) => error!(cmd = %identity, error = %err, "waiting for process"),
        },
        _ = &mut cancel_rx => {
            if let Err(err) = child.kill().await {
                warn!(cmd = %identity, error = %err, "failed to kill process");
            }
        }
    }

    running.send_modify(|n| *n = n.saturating_sub(1));
}
