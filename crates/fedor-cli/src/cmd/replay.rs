use crate::output::print_json;
use anyhow::Context;
use fedor_core::operation_of;
use review_agent::RunLog;
use std::path::Path;

/// Parse a captured stream-json log exactly as a live run would, then print
/// what the supervisor observed.
pub fn run(file: &Path, json: bool) -> anyhow::Result<()> {
    let data = std::fs::read_to_string(file)
        .with_context(|| format!("failed to read {}", file.display()))?;

    let mut log = RunLog::new();
    for line in data.lines() {
        log.ingest_line(line);
    }

    if json {
        let value = serde_json::json!({
            "events": log.events,
            "malformed": log.malformed,
            "commands": log.commands,
            "tools": log.tools,
            "tool_errors": log.tool_errors,
            "result": log.result,
        });
        return print_json(&value);
    }

    println!(
        "{} events, {} malformed lines, {} tool errors",
        log.events, log.malformed, log.tool_errors
    );
    if log.commands.is_empty() {
        println!("No shell commands observed.");
    } else {
        println!("Commands:");
        for c in &log.commands {
            let op = operation_of(c).map(|o| o.recipe()).unwrap_or("-");
            println!("  [{op}] {c}");
        }
    }
    for t in &log.tools {
        println!("Tool: {t}");
    }
    match &log.result {
        Some(r) => {
            println!(
                "Result: cost=${:.4} turns={} duration={:.1}s error={}",
                r.total_cost_usd.unwrap_or(0.0),
                r.num_turns.unwrap_or(0),
                r.duration_secs(),
                r.is_error()
            );
            if let Some(text) = &r.result {
                println!("{text}");
            }
        }
        None => println!("No terminal result event."),
    }
    Ok(())
}
