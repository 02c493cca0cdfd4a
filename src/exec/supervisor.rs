// src/exec/supervisor.rs

use std::path::PathBuf;
use std::process::{ExitStatus, Stdio};
use std::sync::{Arc, PoisonError, RwLock};

use anyhow::{anyhow, Context, Result};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::process::Command;
use tokio::sync::Mutex;
use tracing::{debug, info};

use crate::env::Environment;
use crate::exec::command::{resolve_working_dir, split_command, RunOptions};
use crate::exec::registry::ProcessRegistry;

/// A source suffix whose files must be built before they can be started.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildRule {
    pub suffix: String,
    /// Run in the working directory; the binary it produces is named after
    /// that directory.
    pub command: String,
}

impl BuildRule {
    pub fn new(suffix: impl Into<String>, command: impl Into<String>) -> Self {
        Self {
            suffix: suffix.into(),
            command: command.into(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct SupervisorConfig {
    pub env: Environment,
    pub build_rules: Vec<BuildRule>,
}

impl Default for SupervisorConfig {
    fn default() -> Self {
        Self {
            env: Environment::default(),
            build_rules: vec![BuildRule::new(".go", "go install -a")],
        }
    }
}

/// Runs commands for task handlers.
///
/// `run`/`bash` block until the process exits; `start` launches a
/// long-running process and replaces any earlier process started with the
/// same command text.
pub struct Supervisor {
    environment: RwLock<Environment>,
    build_rules: Vec<BuildRule>,
    registry: ProcessRegistry,
}

impl std::fmt::Debug for Supervisor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Supervisor")
            .field("environment", &self.environment())
            .field("build_rules", &self.build_rules)
            .field("running", &self.registry.running())
            .finish()
    }
}

impl Default for Supervisor {
    fn default() -> Self {
        Self::new(SupervisorConfig::default())
    }
}

impl Supervisor {
    pub fn new(config: SupervisorConfig) -> Self {
        Self {
            environment: RwLock::new(config.env),
            build_rules: config.build_rules,
            registry: ProcessRegistry::new(),
        }
    }

    pub fn environment(&self) -> Environment {
        self.environment
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Replace the global environment overrides.
    pub fn set_environ(&self, vars: impl Into<String>, inherit: bool) {
        let mut env = self.environment.write().unwrap_or_else(PoisonError::into_inner);
        env.vars = vars.into();
        env.inherit = inherit;
    }

    /// Effective environment for a call with the given extra pairs.
    pub fn compose_env(&self, call_env: &[String]) -> Vec<(String, String)> {
        self.environment
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .effective(call_env)
    }

    /// Run a command, streaming its output.
    pub async fn run(&self, command: &str, opts: &RunOptions) -> Result<()> {
        self.run_parsed(command, opts, false).await.map(|_| ())
    }

    /// Run a command, returning stdout and stderr while still streaming them.
    pub async fn run_output(&self, command: &str, opts: &RunOptions) -> Result<String> {
        self.run_parsed(command, opts, true).await
    }

    /// Run a script with bash, streaming its output.
    pub async fn bash(&self, script: &str, opts: &RunOptions) -> Result<()> {
        self.bash_impl(script, opts, false).await.map(|_| ())
    }

    pub async fn bash_output(&self, script: &str, opts: &RunOptions) -> Result<String> {
        self.bash_impl(script, opts, true).await
    }

    /// Start a long-running command without waiting for it.
    ///
    /// A process previously started with the same command text is killed
    /// first. When the executable ends in a registered build suffix, the
    /// build command runs in the working directory and the resulting binary,
    /// named after that directory, is started instead.
    pub async fn start(&self, command: &str, opts: &RunOptions) -> Result<()> {
        let identity = opts.render(command);
        let mut parts = split_command(&identity)?;
        let dir = resolve_working_dir(opts.dir.as_deref())?;

        if let Some(rule) = self
            .build_rules
            .iter()
            .find(|rule| parts.executable.ends_with(&rule.suffix))
        {
            info!(cmd = %rule.command, dir = ?dir, "building before start");
            let build_opts = RunOptions {
                dir: Some(dir.clone()),
                ..opts.clone()
            };
            self.run(&rule.command, &build_opts).await?;
            parts.executable = dir
                .file_name()
                .map(|name| name.to_string_lossy().into_owned())
                .ok_or_else(|| anyhow!("cannot derive executable name from {dir:?}"))?;
        }

        let mut call_env = parts.env;
        call_env.extend(opts.env.iter().cloned());
        let env = self.compose_env(&call_env);

        let mut cmd = Command::new(&parts.executable);
        cmd.args(&parts.argv)
            .env_clear()
            .envs(env)
            .current_dir(&dir)
            .stdin(Stdio::null());

        self.registry.replace(&identity, cmd).await?;
        Ok(())
    }

    /// Kill every started process.
    pub async fn kill_all(&self) {
        self.registry.kill_all().await;
    }

    /// Wait until every started process has exited.
    pub async fn wait(&self) {
        self.registry.wait().await;
    }

    /// Number of started processes still running.
    pub fn running(&self) -> usize {
        self.registry.running()
    }

    pub async fn pids(&self) -> Vec<(String, u32)> {
        self.registry.pids().await
    }

    /// Whether a process started with this command text is still running.
    pub async fn is_tracked(&self, command: &str) -> bool {
        self.registry.is_tracked(command).await
    }

    async fn run_parsed(&self, command: &str, opts: &RunOptions, capture: bool) -> Result<String> {
        let command = opts.render(command);
        let parts = split_command(&command)?;
        let dir = resolve_working_dir(opts.dir.as_deref())?;

        let mut call_env = parts.env;
        call_env.extend(opts.env.iter().cloned());

        let mut cmd = Command::new(&parts.executable);
        cmd.args(&parts.argv);
        self.execute(cmd, &command, &call_env, dir, capture).await
    }

    async fn bash_impl(&self, script: &str, opts: &RunOptions, capture: bool) -> Result<String> {
        let script = opts.render(script);
        let dir = resolve_working_dir(opts.dir.as_deref())?;

        let mut cmd = if cfg!(windows) {
            let mut c = Command::new("cmd");
            c.arg("/C").arg(&script);
            c
        } else {
            let mut c = Command::new("bash");
            c.arg("-c").arg(&script);
            c
        };
        self.execute(cmd, &script, &opts.env, dir, capture).await
    }

    async fn execute(
        &self,
        mut cmd: Command,
        label: &str,
        call_env: &[String],
        dir: PathBuf,
        capture: bool,
    ) -> Result<String> {
        let env = self.compose_env(call_env);
        cmd.env_clear()
            .envs(env)
            .current_dir(&dir)
            .stdin(Stdio::inherit())
            .kill_on_drop(true);

        debug!(cmd = %label, dir = ?dir, capture, "running");

        if !capture {
            let status = cmd
                .stdout(Stdio::inherit())
                .stderr(Stdio::inherit())
                .status()
                .await
                .with_context(|| format!("running \"{label}\""))?;
            return check_status(label, status).map(|()| String::new());
        }

        cmd.stdout(Stdio::piped()).stderr(Stdio::piped());
        let mut child = cmd.spawn().with_context(|| format!("running \"{label}\""))?;

        let buffer = Arc::new(Mutex::new(Vec::new()));
        let stdout = child
            .stdout
            .take()
            .map(|out| tokio::spawn(tee(out, tokio::io::stdout(), Arc::clone(&buffer))));
        let stderr = child
            .stderr
            .take()
            .map(|err| tokio::spawn(tee(err, tokio::io::stderr(), Arc::clone(&buffer))));

        let status = child
            .wait()
            .await
            .with_context(|| format!("waiting for \"{label}\""))?;
        for copier in [stdout, stderr].into_iter().flatten() {
            copier.await.context("output copier panicked")??;
        }

        check_status(label, status)?;
        let captured = buffer.lock().await;
        Ok(String::from_utf8_lossy(&captured).into_owned())
    }
}

fn check_status(label: &str, status: ExitStatus) -> Result<()> {
    if status.success() {
        return Ok(());
    }
    Err(match status.code() {
        Some(code) => anyhow!("\"{label}\" exited with status {code}"),
        None => anyhow!("\"{label}\" was terminated by a signal"),
    })
}

/// Copy `reader` to `writer` chunk by chunk, also appending to `buffer`.
async fn tee<R, W>(mut reader: R, mut writer: W, buffer: Arc<Mutex<Vec<u8>>>) -> Result<()>
where
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let mut chunk = [0u8; 4096];
    loop {
        let n = reader.read(&mut chunk).await?;
        if n == 0 {
            break;
        }
        writer.write_all(&chunk[..n]).await?;
        writer.flush().await?;
        buffer.lock().await.extend_from_slice(&chunk[..n]);
    }
    Ok(())
}
