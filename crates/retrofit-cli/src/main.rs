//! CLI binary for running and validating content migration plans.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use retrofit_pipeline::{
    load_plan, validate, MigrationPlan, RecordingReplicator, RunMode, RunReport, Services, Severity,
};
use retrofit_store::MemoryStore;

#[derive(Parser)]
#[command(
    name = "retrofit",
    version,
    about = "Batch content migrations with dry-run and single commit"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a plan against a JSON content tree
    Run {
        /// Content tree (JSON export)
        #[arg(short, long)]
        content: PathBuf,

        /// Migration plan (JSON)
        #[arg(short, long)]
        plan: PathBuf,

        /// Report what would change without writing anything
        #[arg(long)]
        dry_run: bool,

        /// Where to write the migrated tree (default: overwrite --content)
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Print the run report as JSON
        #[arg(long)]
        json: bool,
    },

    /// Validate a plan file
    Validate {
        /// Path to the plan file
        plan: PathBuf,
    },

    /// Show information about a plan
    Info {
        /// Path to the plan file
        plan: PathBuf,
    },
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let level = if cli.verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Commands::Run {
            content,
            plan,
            dry_run,
            output,
            json,
        } => {
            let mode = if dry_run { RunMode::Dry } else { RunMode::Live };
            let outcome = cmd_run(&content, &plan, mode, output.as_deref())?;
            print_report(&outcome.report, json)?;
            for (page, action) in &outcome.replications {
                println!("Replication requested: {action} {page}");
            }
            if let Some(error) = outcome.aborted {
                anyhow::bail!("content migration aborted: {error}");
            }
        }
        Commands::Validate { plan } => {
            cmd_validate(&plan)?;
        }
        Commands::Info { plan } => {
            cmd_info(&plan)?;
        }
    }

    Ok(())
}

struct RunOutcome {
    report: RunReport,
    replications: Vec<(String, retrofit_pipeline::ReplicationAction)>,
    aborted: Option<retrofit_types::RetrofitError>,
}

fn load(path: &Path) -> anyhow::Result<MigrationPlan> {
    Ok(load_plan(path)?)
}

/// Run a plan file against a content file. A committed live run writes the
/// tree to `output`, or back to `content` when no output is given.
fn cmd_run(
    content: &Path,
    plan_path: &Path,
    mode: RunMode,
    output: Option<&Path>,
) -> anyhow::Result<RunOutcome> {
    let plan = load(plan_path)?;
    for diag in validate(&plan) {
        match diag.severity {
            Severity::Error => {
                anyhow::bail!("invalid plan {}: {}", plan_path.display(), diag.message)
            }
            Severity::Warning => tracing::warn!(rule = %diag.rule, "{}", diag.message),
            Severity::Info => tracing::info!(rule = %diag.rule, "{}", diag.message),
        }
    }

    let mut store = MemoryStore::load(content)?;
    let replicator = Arc::new(RecordingReplicator::new());
    let services = Services::new().with_replicator(replicator.clone());

    let (report, aborted) = match plan.run(&mut store, &services, mode) {
        Ok(report) => (report, None),
        Err(failure) => (failure.report, Some(failure.error)),
    };

    if report.committed {
        let target = output.unwrap_or(content);
        store.save(target)?;
        tracing::info!(file = %target.display(), "Migrated content written");
    }

    Ok(RunOutcome {
        report,
        replications: replicator.calls(),
        aborted,
    })
}

fn print_report(report: &RunReport, json: bool) -> anyhow::Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(report)?);
        return Ok(());
    }
    print!("{report}");
    println!(
        "\n{} node(s): {} applied, {} unchanged, {} failed, {} skipped{}",
        report.nodes_visited,
        report.applied,
        report.unchanged,
        report.failed,
        report.skipped,
        if report.committed { ", committed" } else { "" }
    );
    Ok(())
}

fn cmd_validate(path: &Path) -> anyhow::Result<()> {
    let plan = load(path)?;
    let diagnostics = validate(&plan);

    if diagnostics.is_empty() {
        println!("Plan is valid");
        return Ok(());
    }

    let mut has_error = false;
    for diag in &diagnostics {
        let severity = match diag.severity {
            Severity::Error => {
                has_error = true;
                "ERROR"
            }
            Severity::Warning => "WARN",
            Severity::Info => "INFO",
        };
        println!("[{}] {}: {}", severity, diag.rule, diag.message);
        if let Some(fix) = &diag.fix {
            println!("    fix: {fix}");
        }
    }

    if has_error {
        std::process::exit(1);
    }
    Ok(())
}

fn cmd_info(path: &Path) -> anyhow::Result<()> {
    let plan = load(path)?;

    println!("Plan: {}", path.display());
    println!("Traversals: {}", plan.traversals().len());
    for traversal in plan.traversals() {
        println!("  {traversal}");
    }
    match plan.filter() {
        Some(filter) => println!("Filter: {filter}"),
        None => println!("Filter: (accept all)"),
    }
    println!("Actions: {}", plan.actions().len());
    for (i, action) in plan.actions().iter().enumerate() {
        let kind = if action.is_mutating() { "write" } else { "read" };
        println!("  {}. {} [{}]", i + 1, action, kind);
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    const CONTENT: &str = r#"{
        "content": {
            "site": {
                "home": { "jcr:title": "Home" },
                "about": {}
            }
        }
    }"#;

    const PLAN: &str = r#"{
        "traversals": [{ "type": "children_of", "path": "/content/site" }],
        "filters": [{ "type": "has_property", "name": "jcr:title" }],
        "actions": [{ "type": "set_property", "name": "status", "value": "migrated" }]
    }"#;

    fn fixture() -> (tempfile::TempDir, PathBuf, PathBuf) {
        let dir = tempfile::tempdir().unwrap();
        let content = dir.path().join("content.json");
        let plan = dir.path().join("plan.json");
        std::fs::write(&content, CONTENT).unwrap();
        std::fs::write(&plan, PLAN).unwrap();
        (dir, content, plan)
    }

    fn status_of(file: &Path) -> Option<String> {
        let text = std::fs::read_to_string(file).unwrap();
        let tree: serde_json::Value = serde_json::from_str(&text).unwrap();
        tree["content"]["site"]["home"]["status"].as_str().map(str::to_string)
    }

    #[test]
    fn dry_run_leaves_content_file_alone() {
        let (_dir, content, plan) = fixture();
        let outcome = cmd_run(&content, &plan, RunMode::Dry, None).unwrap();
        assert_eq!(outcome.report.applied, 1);
        assert!(!outcome.report.committed);
        assert_eq!(std::fs::read_to_string(&content).unwrap(), CONTENT);
    }

    #[test]
    fn live_run_writes_output() {
        let (dir, content, plan) = fixture();
        let output = dir.path().join("out.json");
        let outcome = cmd_run(&content, &plan, RunMode::Live, Some(&output)).unwrap();
        assert!(outcome.report.committed);
        assert!(outcome.aborted.is_none());
        assert_eq!(status_of(&output).as_deref(), Some("migrated"));
        assert_eq!(status_of(&content), None);
    }

    #[test]
    fn live_run_without_output_overwrites_content() {
        let (_dir, content, plan) = fixture();
        cmd_run(&content, &plan, RunMode::Live, None).unwrap();
        assert_eq!(status_of(&content).as_deref(), Some("migrated"));
    }

    #[test]
    fn invalid_plan_is_rejected_before_running() {
        let (dir, content, _) = fixture();
        let plan = dir.path().join("bad.json");
        std::fs::write(
            &plan,
            r#"{ "traversals": [{ "type": "children_of", "path": "content" }],
                 "actions": [{ "type": "print_path" }] }"#,
        )
        .unwrap();
        let err = cmd_run(&content, &plan, RunMode::Live, None).err().unwrap();
        assert!(err.to_string().contains("invalid plan"));
    }

    #[test]
    fn cli_parses_run_arguments() {
        let cli = Cli::parse_from([
            "retrofit", "run", "--content", "c.json", "--plan", "p.json", "--dry-run", "--json",
        ]);
        match cli.command {
            Commands::Run {
                dry_run, json, output, ..
            } => {
                assert!(dry_run);
                assert!(json);
                assert!(output.is_none());
            }
            _ => panic!("expected run"),
        }
    }
}
