//! Local execution backend.
//!
//! Jobs run as child processes of this machine: `submit` spawns the `worker`
//! subcommand of this binary for the descriptor and uses the pid as the
//! submission id. The worker is told to wait until the driver has recorded the
//! submission, so its journal entries always follow `status=submitted`.

use async_trait::async_trait;
use nix::errno::Errno;
use nix::sys::signal::kill;
use nix::unistd::Pid;
use std::collections::HashMap;
use std::process::Stdio;
use std::sync::Arc;
use std::time::Duration;
use tokio::process::{Child, Command};
use tokio::sync::Mutex;

use super::tools::{hidden_sibling, ToolRunner};
use crate::domain::errors::{DomainError, DomainResult};
use crate::domain::models::JobDescriptor;
use crate::domain::ports::{ExecutionBackend, SubmissionId};

/// Local backend configuration.
#[derive(Debug, Clone)]
pub struct LocalBackendConfig {
    /// Program started as the worker, normally the current executable
    pub worker_program: String,
    /// Global arguments passed before the `worker` subcommand
    pub worker_args: Vec<String>,
    /// Poll interval when waiting on a pid we did not spawn
    pub poll_interval: Duration,
}

impl Default for LocalBackendConfig {
    fn default() -> Self {
        Self {
            worker_program: std::env::current_exe()
                .map(|p| p.to_string_lossy().into_owned())
                .unwrap_or_else(|_| "babysitter".to_string()),
            worker_args: Vec::new(),
            poll_interval: Duration::from_secs(5),
        }
    }
}

/// Local child-process backend.
pub struct LocalBackend {
    config: LocalBackendConfig,
    tools: ToolRunner,
    children: Arc<Mutex<HashMap<i32, Child>>>,
}

impl LocalBackend {
    pub fn new(config: LocalBackendConfig, tools: ToolRunner) -> Self {
        Self {
            config,
            tools,
            children: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    fn worker_command(&self, descriptor: &JobDescriptor) -> DomainResult<Command> {
        let path = descriptor.path();
        let open = |suffix: &str| {
            let log = hidden_sibling(path, suffix);
            std::fs::File::create(&log).map_err(|e| DomainError::io(&log, e))
        };
        let mut cmd = Command::new(&self.config.worker_program);
        cmd.args(&self.config.worker_args)
            .arg("worker")
            .arg(path)
            .args(["--backend", "local", "--await-submission"])
            .stdin(Stdio::null())
            .stdout(Stdio::from(open(".out")?))
            .stderr(Stdio::from(open(".err")?));
        Ok(cmd)
    }
}

fn parse_pid(id: &SubmissionId) -> DomainResult<i32> {
    match id.as_str().trim().parse::<i32>() {
        Ok(pid) if pid > 0 => Ok(pid),
        _ => Err(DomainError::BackendResponse(format!(
            "'{id}' is not a process id"
        ))),
    }
}

/// Signal-0 probe of a pid.
fn pid_alive(pid: i32) -> DomainResult<bool> {
    match kill(Pid::from_raw(pid), None) {
        Ok(()) | Err(Errno::EPERM) => Ok(true),
        Err(Errno::ESRCH) => Ok(false),
        Err(e) => Err(DomainError::BackendResponse(format!(
            "probing pid {pid} failed: {e}"
        ))),
    }
}

#[async_trait]
impl ExecutionBackend for LocalBackend {
    fn name(&self) -> &'static str {
        "local"
    }

    async fn submit(&self, descriptor: &JobDescriptor) -> DomainResult<SubmissionId> {
        let mut cmd = self.worker_command(descriptor)?;
        let child = cmd.spawn().map_err(|e| {
            tracing::warn!(
                program = %self.config.worker_program,
                error = %e,
                "failed to spawn worker"
            );
            DomainError::ProcessFailure {
                command: self.config.worker_program.clone(),
                code: None,
            }
        })?;
        let pid = child
            .id()
            .and_then(|pid| i32::try_from(pid).ok())
            .ok_or_else(|| DomainError::BackendResponse("worker exited before it got a pid".into()))?;

        tracing::info!(descriptor = %descriptor.path().display(), pid, "worker started");
        self.children.lock().await.insert(pid, child);
        Ok(SubmissionId::new(pid.to_string()))
    }

    async fn is_running(&self, id: &SubmissionId) -> DomainResult<bool> {
        let pid = parse_pid(id)?;
        let mut children = self.children.lock().await;
        if let Some(child) = children.get_mut(&pid) {
            let exited = child
                .try_wait()
                .map_err(|e| DomainError::BackendResponse(format!("pid {pid}: {e}")))?
                .is_some();
            if exited {
                children.remove(&pid);
            }
            return Ok(!exited);
        }
        drop(children);
        pid_alive(pid)
    }

    async fn wait_for_completion(
        &self,
        _descriptor: &JobDescriptor,
        id: &SubmissionId,
    ) -> DomainResult<()> {
        let pid = parse_pid(id)?;
        let child = self.children.lock().await.remove(&pid);
        if let Some(mut child) = child {
            let status = child
                .wait()
                .await
                .map_err(|e| DomainError::BackendResponse(format!("pid {pid}: {e}")))?;
            tracing::debug!(pid, ?status, "worker exited");
            return Ok(());
        }
        while pid_alive(pid)? {
            tokio::time::sleep(self.config.poll_interval).await;
        }
        tracing::debug!(pid, "process gone");
        Ok(())
    }

    async fn create_auxiliary_files(&self, descriptor: &JobDescriptor) -> DomainResult<()> {
        self.tools.create_auxiliary_files(descriptor).await
    }

    async fn run_solver(&self, descriptor: &JobDescriptor) -> DomainResult<()> {
        self.tools.run_solver(descriptor).await
    }
}
