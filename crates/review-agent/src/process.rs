use std::fmt;
use std::path::{Path, PathBuf};
use std::process::{ExitStatus, Stdio};

use tokio::process::{Child, ChildStderr, ChildStdout, Command};

use crate::{AgentError, Result};

// ─── Allow-list ───────────────────────────────────────────────────────────

/// One capability granted to the agent, rendered in the CLI's
/// `--allowedTools` syntax.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ToolGrant {
    /// `Bash(<pattern>)`: shell commands matching the pattern.
    Shell(String),
    /// `Read(<dir>/*)`: file reads below a directory.
    Read(PathBuf),
}

impl fmt::Display for ToolGrant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ToolGrant::Shell(pattern) => write!(f, "Bash({pattern})"),
            ToolGrant::Read(dir) => write!(f, "Read({}/*)", dir.display()),
        }
    }
}

/// The complete, fixed set of grants for a review run.
///
/// There is no way to add a grant from outside the crate: prompt content and
/// webhook payloads cannot widen what the agent may do.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AllowList {
    grants: Vec<ToolGrant>,
}

impl AllowList {
    /// `just` recipes only, plus reads inside the clone directory.
    pub fn review(clone_dir: &Path) -> Self {
        Self {
            grants: vec![
                ToolGrant::Shell("just *".to_string()),
                ToolGrant::Read(clone_dir.to_path_buf()),
            ],
        }
    }

    pub fn grants(&self) -> &[ToolGrant] {
        &self.grants
    }
}

// ─── AgentCommand ─────────────────────────────────────────────────────────

/// Fully materialised invocation of the agent CLI. Immutable once built.
#[derive(Debug, Clone)]
pub struct AgentCommand {
    /// Executable name or path (default `claude`).
    pub program: String,
    pub prompt: String,
    pub allow: AllowList,
    /// Working directory of the child (where the `justfile` lives).
    pub cwd: PathBuf,
    /// Extra environment for the child.
    pub env: Vec<(String, String)>,
}

impl AgentCommand {
    /// Arguments passed after the program name.
    pub fn args(&self) -> Vec<String> {
        let mut args = vec![
            "-p".to_string(),
            self.prompt.clone(),
            "--output-format".to_string(),
            "stream-json".to_string(),
            "--verbose".to_string(),
        ];
        for grant in self.allow.grants() {
            args.push("--allowedTools".to_string());
            args.push(grant.to_string());
        }
        args
    }

    fn build(&self) -> Command {
        let mut cmd = Command::new(&self.program);
        cmd.args(self.args()).current_dir(&self.cwd);

        // Lets the agent start from inside another agent session.
        cmd.env_remove("CLAUDECODE");
        for (k, v) in &self.env {
            cmd.env(k, v);
        }
        cmd
    }
}

// ─── AgentProcess ─────────────────────────────────────────────────────────

/// A running agent child with both output pipes captured.
///
/// The child is spawned with `kill_on_drop`, so dropping the handle on any
/// exit path (including a panic in the supervisor) terminates it.
pub(crate) struct AgentProcess {
    child: Child,
    stdout: Option<ChildStdout>,
    stderr: Option<ChildStderr>,
}

impl AgentProcess {
    pub(crate) fn spawn(command: &AgentCommand) -> Result<Self> {
        Self::from_command(command.build(), &command.program)
    }

    /// Spawn an arbitrary command in place of the agent.
    /// Used in unit tests to inject a shell script that emits fixed lines.
    #[cfg(test)]
    pub(crate) fn spawn_command(cmd: Command) -> Result<Self> {
        Self::from_command(cmd, "test command")
    }

    fn from_command(mut cmd: Command, program: &str) -> Result<Self> {
        cmd.stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        let mut child = cmd.spawn().map_err(|source| AgentError::Spawn {
            command: program.to_string(),
            source,
        })?;

        let stdout = child.stdout.take();
        let stderr = child.stderr.take();
        if stdout.is_none() || stderr.is_none() {
            return Err(AgentError::Process("output pipes not captured".into()));
        }

        Ok(Self {
            child,
            stdout,
            stderr,
        })
    }

    /// Hand the two pipes to the caller. Each can be taken once.
    pub(crate) fn take_pipes(&mut self) -> Result<(ChildStdout, ChildStderr)> {
        match (self.stdout.take(), self.stderr.take()) {
            (Some(out), Some(err)) => Ok((out, err)),
            _ => Err(AgentError::Process("output pipes already taken".into())),
        }
    }

    pub(crate) fn id(&self) -> Option<u32> {
        self.child.id()
    }

    pub(crate) async fn wait(&mut self) -> Result<ExitStatus> {
        self.child.wait().await.map_err(AgentError::Io)
    }

    /// Kill the child and reap it. Errors are ignored: the child may already
    /// have exited between the deadline firing and this call.
    pub(crate) async fn kill(&mut self) {
        let _ = self.child.kill().await;
    }
}
