use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use fedor_core::{operation_of, render_prompt, Config, Target};
use review_agent::{RunConfig, RunReport};
use tokio::sync::OwnedMutexGuard;
use tracing::info;

/// Build the orchestrator settings for one run from the service config.
pub fn run_config(config: &Config) -> RunConfig {
    RunConfig {
        program: config.agent_command.clone(),
        project_dir: config.project_dir.clone(),
        clone_dir: config.clone_dir.clone(),
        deadline: config.run_timeout(),
        dummy: config.dummy_mode,
    }
}

// ---------------------------------------------------------------------------
// RunLocks
// ---------------------------------------------------------------------------

/// One async lock per target; runs for the same target never overlap.
#[derive(Default)]
struct RunLocks {
    locks: Mutex<HashMap<Target, Arc<tokio::sync::Mutex<()>>>>,
}

impl RunLocks {
    async fn acquire(&self, target: &Target) -> OwnedMutexGuard<()> {
        let lock = {
            let mut locks = self.locks.lock().unwrap_or_else(|p| p.into_inner());
            Arc::clone(locks.entry(target.clone()).or_default())
        };
        lock.lock_owned().await
    }

    /// Drop the lock entry for `target` when nobody else holds or waits on it.
    fn release(&self, target: &Target) {
        let mut locks = self.locks.lock().unwrap_or_else(|p| p.into_inner());
        if locks
            .get(target)
            .is_some_and(|l| Arc::strong_count(l) == 1)
        {
            locks.remove(target);
        }
    }

    fn len(&self) -> usize {
        self.locks.lock().unwrap_or_else(|p| p.into_inner()).len()
    }
}

// ---------------------------------------------------------------------------
// Reviewer
// ---------------------------------------------------------------------------

/// Turns a matured trigger into one supervised agent run.
#[derive(Clone)]
pub struct Reviewer {
    config: Arc<Config>,
    locks: Arc<RunLocks>,
}

impl Reviewer {
    pub fn new(config: Arc<Config>) -> Self {
        Self {
            config,
            locks: Arc::new(RunLocks::default()),
        }
    }

    /// Run the agent for `target`, waiting for any in-flight run on the same
    /// target to finish first. Never fails; the outcome is logged and returned.
    pub async fn review(&self, target: Target, reason: String) -> RunReport {
        let guard = self.locks.acquire(&target).await;

        let prompt = render_prompt(
            &target,
            &reason,
            &self.config.clone_dir,
            &self.config.bot_login,
        );
        let key = target.to_string();
        info!(key = %key, reason = %reason, "review: starting");

        let report = review_agent::run(&run_config(&self.config), &key, prompt).await;
        log_report(&key, &report);

        drop(guard);
        self.locks.release(&target);
        report
    }

    /// Number of targets with a run lock currently allocated.
    pub fn active_locks(&self) -> usize {
        self.locks.len()
    }
}

fn log_report(key: &str, report: &RunReport) {
    // The runner has already logged the outcome; add which operations were used.
    let ops: Vec<&str> = report
        .log
        .commands
        .iter()
        .filter_map(|c| operation_of(c))
        .map(|op| op.recipe())
        .collect();
    info!(
        key = %key,
        run_id = %report.run_id,
        outcome = report.outcome.as_str(),
        ?ops,
        "review: finished"
    );
}
