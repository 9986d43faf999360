use crate::output::print_json;
use anyhow::Context;
use fedor_core::{Config, Target};
use fedor_server::Reviewer;
use review_agent::RunReport;
use serde::Serialize;
use std::path::Path;
use std::sync::Arc;

#[derive(Serialize)]
struct RunSummary<'a> {
    target: String,
    run_id: String,
    outcome: &'static str,
    elapsed_secs: f64,
    commands: &'a [String],
    cost_usd: Option<f64>,
    turns: Option<u32>,
    result: Option<&'a str>,
}

impl<'a> RunSummary<'a> {
    fn new(target: &Target, report: &'a RunReport) -> Self {
        let result = report.log.result.as_ref();
        Self {
            target: target.to_string(),
            run_id: report.run_id.to_string(),
            outcome: report.outcome.as_str(),
            elapsed_secs: report.elapsed.as_secs_f64(),
            commands: &report.log.commands,
            cost_usd: result.and_then(|r| r.total_cost_usd),
            turns: result.and_then(|r| r.num_turns),
            result: report.result_text(),
        }
    }
}

pub fn run(
    config_path: Option<&Path>,
    repo: &str,
    pr: u64,
    reason: &str,
    json: bool,
) -> anyhow::Result<()> {
    let config = Config::load(config_path).context("failed to load config")?;
    if config.run_timeout_secs == 0 {
        anyhow::bail!("run timeout must be greater than zero");
    }
    let target = Target::parse_parts(repo, pr)?;

    let rt = tokio::runtime::Runtime::new()?;
    let reviewer = Reviewer::new(Arc::new(config));
    let report = rt.block_on(reviewer.review(target.clone(), reason.to_string()));

    let summary = RunSummary::new(&target, &report);
    if json {
        print_json(&summary)?;
    } else {
        println!("{}: {}", summary.target, summary.outcome);
        println!("  run id:   {}", summary.run_id);
        println!("  elapsed:  {:.1}s", summary.elapsed_secs);
        if let Some(cost) = summary.cost_usd {
            println!("  cost:     ${cost:.4}");
        }
        if let Some(turns) = summary.turns {
            println!("  turns:    {turns}");
        }
        for c in summary.commands {
            println!("  $ {c}");
        }
        if let Some(result) = summary.result {
            println!("  result:   {result}");
        }
    }

    if !report.outcome.is_success() {
        anyhow::bail!("review of {target} ended with outcome '{}'", report.outcome.as_str());
    }
    Ok(())
}
