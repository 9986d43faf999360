use std::path::PathBuf;
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tracing::{error, info, warn, Instrument};
use uuid::Uuid;

use crate::parser::{preview, RunLog, LINE_PREVIEW};
use crate::process::{AgentCommand, AgentProcess, AllowList};
use crate::Result;

/// Result text reported by dummy-mode runs.
pub const DUMMY_RESULT: &str = "Ponnggg";

/// Environment variable carrying the per-run scratch directory.
///
/// The agent's only shell grant is `just *`, so the consumers are the `just`
/// recipes, which inherit the agent's environment. Recipes that need a
/// temporary file (a review body staged for `gh api --input`, a fetched diff)
/// write it here instead of into the project or the shared clone directory.
/// The directory is private to one run and deleted when the run ends,
/// whatever the outcome.
pub const RUN_DIR_ENV: &str = "FEDOR_RUN_DIR";

// ─── RunConfig ────────────────────────────────────────────────────────────

/// Per-run supervision settings. Built once from the service configuration.
#[derive(Debug, Clone)]
pub struct RunConfig {
    /// Agent executable (default `claude`).
    pub program: String,
    /// Working directory for the child.
    pub project_dir: PathBuf,
    /// Root for cloned sources; the read grant and the scratch directory live here.
    pub clone_dir: PathBuf,
    /// Hard wall-clock limit for the whole run.
    pub deadline: Duration,
    /// Skip the subprocess entirely and report [`Outcome::Dummy`].
    pub dummy: bool,
}

// ─── Outcome ──────────────────────────────────────────────────────────────

/// How a run ended.
#[derive(Debug, Clone, PartialEq)]
pub enum Outcome {
    /// Exit code 0 and at least one shell command observed.
    Success { commands: usize },
    /// Exit code 0 but the agent never acted through its command surface.
    NoOp,
    /// Non-zero exit. `code` is `None` when the child died from a signal.
    Failed { code: Option<i32> },
    /// The deadline elapsed and the child was killed.
    TimedOut,
    /// The run could not be carried out (spawn failure, I/O error).
    Internal(String),
    /// Dummy mode: nothing was spawned.
    Dummy,
}

impl Outcome {
    pub fn is_success(&self) -> bool {
        matches!(self, Outcome::Success { .. } | Outcome::Dummy)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Outcome::Success { .. } => "success",
            Outcome::NoOp => "no_op",
            Outcome::Failed { .. } => "failed",
            Outcome::TimedOut => "timed_out",
            Outcome::Internal(_) => "internal_error",
            Outcome::Dummy => "dummy",
        }
    }
}

/// Everything known about a finished run.
#[derive(Debug, Clone)]
pub struct RunReport {
    pub run_id: Uuid,
    pub started_at: DateTime<Utc>,
    pub elapsed: Duration,
    pub outcome: Outcome,
    pub log: RunLog,
}

impl RunReport {
    /// Final result text reported by the agent, if any.
    pub fn result_text(&self) -> Option<&str> {
        self.log.result.as_ref().and_then(|r| r.result.as_deref())
    }
}

// ─── Public API ───────────────────────────────────────────────────────────

/// Run the agent once for `target` with `prompt` and supervise it to the end.
///
/// Never returns an error: every failure is classified into the report's
/// [`Outcome`] and logged with the target and elapsed time.
pub async fn run(config: &RunConfig, target: &str, prompt: String) -> RunReport {
    let run_id = Uuid::new_v4();
    let span = tracing::info_span!("agent_run", key = %target, run_id = %run_id);
    run_inner(config, target, prompt, run_id)
        .instrument(span)
        .await
}

async fn run_inner(config: &RunConfig, target: &str, prompt: String, run_id: Uuid) -> RunReport {
    let started_at = Utc::now();
    let start = Instant::now();

    if config.dummy {
        info!("Dummy mode enabled, skipping agent run");
        let mut log = RunLog::new();
        log.result = Some(crate::types::TerminalResult {
            result: Some(DUMMY_RESULT.to_string()),
            ..Default::default()
        });
        return RunReport {
            run_id,
            started_at,
            elapsed: start.elapsed(),
            outcome: Outcome::Dummy,
            log,
        };
    }

    let mut log = RunLog::new();
    let outcome = match prepare_and_supervise(config, prompt, &mut log).await {
        Ok(outcome) => outcome,
        Err(e) => {
            error!(error = %e, "agent run failed for {target}");
            Outcome::Internal(e.to_string())
        }
    };
    let elapsed = start.elapsed();
    log_outcome(target, &outcome, elapsed);

    RunReport {
        run_id,
        started_at,
        elapsed,
        outcome,
        log,
    }
}

async fn prepare_and_supervise(
    config: &RunConfig,
    prompt: String,
    log: &mut RunLog,
) -> Result<Outcome> {
    tokio::fs::create_dir_all(&config.clone_dir).await?;
    // Removed when dropped, on every path out of this function.
    let scratch = tempfile::Builder::new()
        .prefix("run-")
        .tempdir_in(&config.clone_dir)?;

    let command = AgentCommand {
        program: config.program.clone(),
        prompt,
        allow: AllowList::review(&config.clone_dir),
        cwd: config.project_dir.clone(),
        env: vec![(
            RUN_DIR_ENV.to_string(),
            scratch.path().display().to_string(),
        )],
    };

    let process = AgentProcess::spawn(&command)?;
    supervise(process, config.deadline, log).await
}

fn log_outcome(target: &str, outcome: &Outcome, elapsed: Duration) {
    let secs = elapsed.as_secs_f64();
    match outcome {
        Outcome::Success { commands } => {
            info!("Review completed for {target}: ran {commands} commands ({secs:.1}s)")
        }
        Outcome::NoOp => {
            warn!("Agent ran no commands for {target}, review likely not posted ({secs:.1}s)")
        }
        Outcome::Failed { code: Some(code) } => {
            error!("Agent exited with code {code} for {target} ({secs:.1}s)")
        }
        Outcome::Failed { code: None } => {
            error!("Agent terminated by signal for {target} ({secs:.1}s)")
        }
        Outcome::TimedOut => error!("Agent timed out for {target} ({secs:.1}s)"),
        Outcome::Internal(msg) => error!("Review failed for {target}: {msg} ({secs:.1}s)"),
        Outcome::Dummy => {}
    }
}

// ─── Supervision ──────────────────────────────────────────────────────────

/// Drain both pipes concurrently, wait for exit, and enforce the deadline.
///
/// The drains and the wait are joined into one future raced against the
/// deadline. If the deadline wins, that future is dropped (closing our ends
/// of the pipes) and the child is killed before returning.
pub(crate) async fn supervise(
    mut process: AgentProcess,
    deadline: Duration,
    log: &mut RunLog,
) -> Result<Outcome> {
    let (stdout, stderr) = process.take_pipes()?;
    info!(pid = ?process.id(), deadline_secs = deadline.as_secs(), "agent spawned");

    let finished = {
        let stdout_drain = drain_stdout(stdout, log);
        let stderr_drain = drain_stderr(stderr);
        let work = async {
            let (out, err) = tokio::join!(stdout_drain, stderr_drain);
            out?;
            err?;
            process.wait().await
        };
        tokio::time::timeout(deadline, work).await
    };

    let status = match finished {
        Ok(status) => status,
        Err(_elapsed) => {
            process.kill().await;
            return Ok(Outcome::TimedOut);
        }
    };
    let status = match status {
        Ok(s) => s,
        Err(e) => {
            process.kill().await;
            return Err(e);
        }
    };

    Ok(if !status.success() {
        Outcome::Failed {
            code: status.code(),
        }
    } else if log.commands.is_empty() {
        Outcome::NoOp
    } else {
        Outcome::Success {
            commands: log.commands.len(),
        }
    })
}

async fn drain_stdout<R: AsyncRead + Unpin>(stdout: R, log: &mut RunLog) -> Result<()> {
    for_each_line(stdout, |line| {
        log.ingest_line(line);
    })
    .await
}

async fn drain_stderr<R: AsyncRead + Unpin>(stderr: R) -> Result<()> {
    for_each_line(stderr, |line| {
        let line = line.trim_end();
        if !line.is_empty() {
            warn!("[agent:stderr] {}", preview(line, LINE_PREVIEW));
        }
    })
    .await
}

/// Feed each line to `f` until EOF. Invalid UTF-8 is replaced, not fatal.
async fn for_each_line<R, F>(reader: R, mut f: F) -> Result<()>
where
    R: AsyncRead + Unpin,
    F: FnMut(&str),
{
    let mut reader = BufReader::new(reader);
    let mut buf = Vec::with_capacity(4096);
    loop {
        buf.clear();
        if reader.read_until(b'\n', &mut buf).await? == 0 {
            return Ok(());
        }
        f(&String::from_utf8_lossy(&buf));
    }
}

// ─── Tests ────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::process::Command;

    const BASH_LINE: &str = r#"{"type":"assistant","message":{"content":[{"type":"tool_use","name":"Bash","input":{"command":"just approve acme/repo 42 \"LGTM\""}}]}}"#;
    const RESULT_LINE: &str = r#"{"type":"result","subtype":"success","is_error":false,"num_turns":2,"total_cost_usd":0.01,"duration_ms":1200,"result":"ok"}"#;

    /// Build a `sh -c` mock agent that prints the given lines to stdout.
    fn mock_agent(lines: &[&str], tail: &str) -> AgentProcess {
        let mut script = String::new();
        for line in lines {
            script.push_str(&format!("printf '%s\\n' '{}'\n", line.replace('\'', r"'\''")));
        }
        script.push_str(tail);
        let mut cmd = Command::new("sh");
        cmd.arg("-c").arg(script);
        AgentProcess::spawn_command(cmd).unwrap()
    }

    #[tokio::test]
    async fn clean_exit_with_commands_is_success() {
        let process = mock_agent(&[BASH_LINE, RESULT_LINE], "exit 0");
        let mut log = RunLog::new();
        let outcome = supervise(process, Duration::from_secs(10), &mut log)
            .await
            .unwrap();
        assert_eq!(outcome, Outcome::Success { commands: 1 });
        assert_eq!(log.commands[0], r#"just approve acme/repo 42 "LGTM""#);
        assert_eq!(log.result.unwrap().num_turns, Some(2));
    }

    #[tokio::test]
    async fn clean_exit_without_commands_is_no_op() {
        let process = mock_agent(&[RESULT_LINE], "exit 0");
        let mut log = RunLog::new();
        let outcome = supervise(process, Duration::from_secs(10), &mut log)
            .await
            .unwrap();
        assert_eq!(outcome, Outcome::NoOp);
        assert!(!outcome.is_success());
    }

    #[tokio::test]
    async fn non_zero_exit_is_failure_even_with_commands() {
        let process = mock_agent(&[BASH_LINE], "exit 3");
        let mut log = RunLog::new();
        let outcome = supervise(process, Duration::from_secs(10), &mut log)
            .await
            .unwrap();
        assert_eq!(outcome, Outcome::Failed { code: Some(3) });
        assert_eq!(log.commands.len(), 1);
    }

    #[tokio::test]
    async fn stderr_and_garbage_do_not_break_the_run() {
        let process = mock_agent(
            &["not json at all", BASH_LINE],
            "echo 'warning: something' >&2\nexit 0",
        );
        let mut log = RunLog::new();
        let outcome = supervise(process, Duration::from_secs(10), &mut log)
            .await
            .unwrap();
        assert_eq!(outcome, Outcome::Success { commands: 1 });
        assert_eq!(log.malformed, 1);
    }

    #[tokio::test]
    async fn invalid_utf8_line_is_skipped_not_fatal() {
        let process = mock_agent(&[BASH_LINE], "printf '\\377\\376 junk\\n'\nexit 0");
        let mut log = RunLog::new();
        let outcome = supervise(process, Duration::from_secs(10), &mut log)
            .await
            .unwrap();
        assert_eq!(outcome, Outcome::Success { commands: 1 });
        assert_eq!(log.malformed, 1);
    }

    #[tokio::test]
    async fn hung_child_is_killed_at_deadline() {
        let process = mock_agent(&[BASH_LINE], "sleep 30");
        let pid = process.id();
        let mut log = RunLog::new();
        let start = Instant::now();
        let outcome = supervise(process, Duration::from_millis(300), &mut log)
            .await
            .unwrap();
        assert_eq!(outcome, Outcome::TimedOut);
        assert!(start.elapsed() >= Duration::from_millis(300));
        assert!(start.elapsed() < Duration::from_secs(10));
        // Output seen before the deadline is kept.
        assert_eq!(log.commands.len(), 1);
        assert!(pid.is_some());
    }

    #[tokio::test]
    async fn child_that_closes_stdout_but_keeps_running_still_times_out() {
        let process = mock_agent(&[], "exec 1>&- 2>&-\nsleep 30");
        let mut log = RunLog::new();
        let outcome = supervise(process, Duration::from_millis(300), &mut log)
            .await
            .unwrap();
        assert_eq!(outcome, Outcome::TimedOut);
    }

    #[tokio::test]
    async fn dummy_mode_spawns_nothing() {
        let config = RunConfig {
            program: "__nonexistent_agent_xyz__".into(),
            project_dir: std::env::temp_dir(),
            clone_dir: std::env::temp_dir().join("fedor-dummy-never-created"),
            deadline: Duration::from_secs(1),
            dummy: true,
        };
        let report = run(&config, "acme/repo#42", "prompt".into()).await;
        assert_eq!(report.outcome, Outcome::Dummy);
        assert_eq!(report.result_text(), Some(DUMMY_RESULT));
        assert!(report.outcome.is_success());
        assert!(!config.clone_dir.exists());
    }

    #[tokio::test]
    async fn missing_program_is_internal_error_and_scratch_is_removed() {
        let clone_dir = tempfile::tempdir().unwrap();
        let config = RunConfig {
            program: "__nonexistent_agent_xyz__".into(),
            project_dir: std::env::temp_dir(),
            clone_dir: clone_dir.path().to_path_buf(),
            deadline: Duration::from_secs(5),
            dummy: false,
        };
        let report = run(&config, "acme/repo#42", "prompt".into()).await;
        assert!(matches!(report.outcome, Outcome::Internal(ref m) if m.contains("__nonexistent_agent_xyz__")));
        assert_eq!(report.outcome.as_str(), "internal_error");
        let leftovers = std::fs::read_dir(clone_dir.path()).unwrap().count();
        assert_eq!(leftovers, 0, "scratch directory must be removed");
    }

    /// Config whose agent is `sh` reading a script: the agent's `-p <prompt>`
    /// arguments become `sh -p <script> ...`, so the prompt names the script.
    fn scripted_run(clone_dir: &std::path::Path, deadline: Duration) -> RunConfig {
        RunConfig {
            program: "sh".into(),
            project_dir: std::env::temp_dir(),
            clone_dir: clone_dir.to_path_buf(),
            deadline,
            dummy: false,
        }
    }

    fn write_script(dir: &tempfile::TempDir, body: &str) -> String {
        let path = dir.path().join("agent.sh");
        std::fs::write(&path, body).unwrap();
        path.display().to_string()
    }

    #[tokio::test]
    async fn scratch_is_removed_after_a_clean_run() {
        let clone_dir = tempfile::tempdir().unwrap();
        let scripts = tempfile::tempdir().unwrap();
        let script = write_script(
            &scripts,
            &format!(
                "echo notes > \"${RUN_DIR_ENV}/notes.txt\" || exit 9\nprintf '%s\\n' '{BASH_LINE}' '{RESULT_LINE}'\n"
            ),
        );

        let config = scripted_run(clone_dir.path(), Duration::from_secs(10));
        let report = run(&config, "acme/repo#42", script).await;
        assert_eq!(report.outcome, Outcome::Success { commands: 1 });
        let leftovers = std::fs::read_dir(clone_dir.path()).unwrap().count();
        assert_eq!(leftovers, 0, "scratch directory must be removed");
    }

    #[tokio::test]
    async fn scratch_is_removed_after_a_timeout() {
        let clone_dir = tempfile::tempdir().unwrap();
        let scripts = tempfile::tempdir().unwrap();
        let script = write_script(
            &scripts,
            &format!("echo notes > \"${RUN_DIR_ENV}/notes.txt\"\nexec sleep 5\n"),
        );

        let started = Instant::now();
        let config = scripted_run(clone_dir.path(), Duration::from_millis(300));
        let report = run(&config, "acme/repo#42", script).await;
        assert_eq!(report.outcome, Outcome::TimedOut);
        assert!(started.elapsed() < Duration::from_secs(4));
        let leftovers = std::fs::read_dir(clone_dir.path()).unwrap().count();
        assert_eq!(leftovers, 0, "scratch directory must be removed");
    }
}
