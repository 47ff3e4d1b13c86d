//! Running the auxiliary-file creator and the solver as child processes.

use std::path::Path;
use std::process::Stdio;
use tokio::process::Command;

use crate::domain::errors::{DomainError, DomainResult};
use crate::domain::models::{ExecutablesConfig, JobDescriptor};

/// Invokes the external tools a job needs, with the configured executables
/// and runtime library path.
#[derive(Debug, Clone, Default)]
pub struct ToolRunner {
    executables: ExecutablesConfig,
    library_path: Option<String>,
}

impl ToolRunner {
    pub fn new(executables: ExecutablesConfig, library_path: Option<String>) -> Self {
        Self {
            executables,
            library_path,
        }
    }

    /// Command for `program` with `LD_LIBRARY_PATH` prefixed by the library path.
    pub fn command(&self, program: &str) -> Command {
        let mut cmd = Command::new(program);
        if let Some(lib) = &self.library_path {
            let value = match std::env::var("LD_LIBRARY_PATH") {
                Ok(existing) if !existing.is_empty() => format!("{lib}:{existing}"),
                _ => lib.clone(),
            };
            cmd.env("LD_LIBRARY_PATH", value);
        }
        cmd
    }

    /// Generate the descriptor's data files with the auxiliary creator.
    pub async fn create_auxiliary_files(&self, descriptor: &JobDescriptor) -> DomainResult<()> {
        let program = descriptor
            .executables
            .aux_creator
            .as_deref()
            .unwrap_or(&self.executables.aux_creator);
        let mut cmd = self.command(program);
        cmd.arg(descriptor.path()).stdin(Stdio::null());
        run(program, cmd).await
    }

    /// Run the solver in the descriptor's directory.
    pub async fn run_solver(&self, descriptor: &JobDescriptor) -> DomainResult<()> {
        let program = descriptor
            .executables
            .solver
            .as_deref()
            .unwrap_or(&self.executables.solver);
        let mut cmd = self.command(program);
        cmd.args(descriptor.solver_args())
            .current_dir(descriptor.directory())
            .stdin(Stdio::null());
        run(program, cmd).await
    }
}

/// Run `cmd` to completion; a nonzero exit is a `ProcessFailure`.
pub async fn run(program: &str, mut cmd: Command) -> DomainResult<()> {
    tracing::debug!(program, "running tool");
    let status = cmd.status().await.map_err(|e| {
        tracing::warn!(program, error = %e, "failed to spawn tool");
        DomainError::ProcessFailure {
            command: program.to_string(),
            code: None,
        }
    })?;
    if status.success() {
        Ok(())
    } else {
        Err(DomainError::ProcessFailure {
            command: program.to_string(),
            code: status.code(),
        })
    }
}

/// Run `cmd`, feeding `input` on stdin, and return its stdout.
pub async fn capture(program: &str, mut cmd: Command, input: Option<&str>) -> DomainResult<String> {
    use tokio::io::AsyncWriteExt;

    cmd.stdin(if input.is_some() {
        Stdio::piped()
    } else {
        Stdio::null()
    })
    .stdout(Stdio::piped())
    .stderr(Stdio::piped());

    let spawn_failure = |e: std::io::Error| {
        tracing::warn!(program, error = %e, "failed to run tool");
        DomainError::ProcessFailure {
            command: program.to_string(),
            code: None,
        }
    };
    let mut child = cmd.spawn().map_err(spawn_failure)?;
    if let (Some(text), Some(mut stdin)) = (input, child.stdin.take()) {
        stdin.write_all(text.as_bytes()).await.map_err(spawn_failure)?;
    }
    let output = child.wait_with_output().await.map_err(spawn_failure)?;
    if !output.status.success() {
        tracing::warn!(
            program,
            stderr = %String::from_utf8_lossy(&output.stderr).trim(),
            "tool failed"
        );
        return Err(DomainError::ProcessFailure {
            command: program.to_string(),
            code: output.status.code(),
        });
    }
    Ok(String::from_utf8_lossy(&output.stdout).into_owned())
}

/// Hidden sibling of `path` with an extra suffix: `dir/run.yaml` becomes
/// `dir/.run.yaml<suffix>`.
pub fn hidden_sibling(path: &Path, suffix: &str) -> std::path::PathBuf {
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    path.with_file_name(format!(".{name}{suffix}"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hidden_sibling() {
        assert_eq!(
            hidden_sibling(Path::new("/jobs/run.yaml"), ".err"),
            Path::new("/jobs/.run.yaml.err")
        );
    }

    #[tokio::test]
    async fn test_nonzero_exit_is_process_failure() {
        let runner = ToolRunner::default();
        let mut cmd = runner.command("sh");
        cmd.args(["-c", "exit 3"]);
        match run("sh", cmd).await {
            Err(DomainError::ProcessFailure { code, .. }) => assert_eq!(code, Some(3)),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_library_path_is_prepended() {
        let runner = ToolRunner::new(ExecutablesConfig::default(), Some("/opt/lib".into()));
        let mut cmd = runner.command("sh");
        cmd.args(["-c", "echo $LD_LIBRARY_PATH"]);
        let out = capture("sh", cmd, None).await.unwrap();
        assert!(out.trim().starts_with("/opt/lib"));
    }

    #[tokio::test]
    async fn test_missing_program_is_process_failure() {
        let cmd = Command::new("/nonexistent/solver");
        assert!(matches!(
            run("/nonexistent/solver", cmd).await,
            Err(DomainError::ProcessFailure { code: None, .. })
        ));
    }
}
