//! CLI commands implementation

use anyhow::{Context, Result};
use npusim_core::{PolicyKind, SimulationConfig, Task, Workload};
use npusim_engine::{SimulationOutcome, SimulationReport, Simulator};
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};
use tracing::{info, Level};

/// Mock job count when no workload is given
pub const DEFAULT_MOCK_TASKS: usize = 20;

/// Command-line values that override the config file
#[derive(Debug, Clone, Default)]
pub struct Overrides {
    pub npus: Option<u32>,
    pub memory: Option<f64>,
    pub duration_limit: Option<f64>,
    pub no_duration_limit: bool,
}

/// Where the tasks for a run come from
#[derive(Debug, Clone)]
pub enum WorkloadSource {
    File(PathBuf),
    Mock(usize),
}

/// Load the config file, or defaults when none is given
pub fn load_config(path: Option<&Path>) -> Result<SimulationConfig> {
    match path {
        Some(path) => SimulationConfig::from_file(path)
            .with_context(|| format!("Failed to load config from {}", path.display())),
        None => Ok(SimulationConfig::default()),
    }
}

/// Apply command-line overrides on top of the config file
pub fn apply_overrides(config: &mut SimulationConfig, overrides: &Overrides) {
    if let Some(npus) = overrides.npus {
        config.total_npus = npus;
        config.devices.clear();
    }
    if let Some(memory) = overrides.memory {
        config.memory_per_npu = memory;
        config.devices.clear();
    }
    if overrides.no_duration_limit {
        config.duration_limit = None;
    } else if let Some(limit) = overrides.duration_limit {
        config.duration_limit = Some(limit);
    }
}

/// Parse a log level name, falling back to info
pub fn parse_level(level: &str) -> Level {
    match level.to_lowercase().as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    }
}

/// Parse policy names; an empty list means every policy
pub fn parse_policies(names: &[String]) -> Result<Vec<PolicyKind>> {
    if names.is_empty() {
        return Ok(PolicyKind::ALL.to_vec());
    }
    let mut kinds = Vec::with_capacity(names.len());
    for name in names {
        let kind: PolicyKind = name.parse()?;
        if !kinds.contains(&kind) {
            kinds.push(kind);
        }
    }
    Ok(kinds)
}

/// Load the workload from a file or generate mock jobs
pub async fn load_workload(source: WorkloadSource) -> Result<Workload> {
    match source {
        WorkloadSource::File(path) => {
            let shown = path.display().to_string();
            let workload = tokio::task::spawn_blocking(move || Workload::from_file(&path))
                .await?
                .with_context(|| format!("Failed to load workload from {}", shown))?;
            info!(tasks = workload.len(), file = %shown, "Workload loaded");
            Ok(workload)
        }
        WorkloadSource::Mock(n) => Ok(Workload::mock(n)),
    }
}

/// Run one simulation on the blocking pool
pub async fn simulate(
    config: SimulationConfig,
    tasks: Vec<Task>,
) -> Result<(SimulationOutcome, Duration)> {
    let handle = tokio::task::spawn_blocking(move || {
        let started = Instant::now();
        Simulator::from_config(&config, tasks).map(|sim| (sim.run(), started.elapsed()))
    });
    Ok(handle.await??)
}

/// JSON output of `run`
#[derive(Serialize)]
struct RunOutput<'a> {
    report: &'a SimulationReport,
    outcome: &'a SimulationOutcome,
}

/// Run one simulation and print the results
pub async fn run(
    config: SimulationConfig,
    workload: Workload,
    show_events: bool,
    json: bool,
) -> Result<()> {
    let (outcome, wall_time) = simulate(config, workload.into_tasks()).await?;
    let report = SimulationReport::from_outcome(&outcome);

    if json {
        let output = RunOutput {
            report: &report,
            outcome: &outcome,
        };
        println!("{}", serde_json::to_string_pretty(&output)?);
        return Ok(());
    }

    print_summary(&report, &outcome, wall_time);
    print_placements(&outcome);
    if show_events {
        print_events(&outcome);
    }
    print_unschedulable(&outcome);

    Ok(())
}

/// One line of the comparison table
#[derive(Debug, Serialize)]
pub struct ComparisonRow {
    pub report: SimulationReport,
    pub wall_time_secs: f64,
}

/// Run the workload under each policy concurrently and compare
pub async fn compare(
    config: SimulationConfig,
    workload: Workload,
    kinds: Vec<PolicyKind>,
    json: bool,
) -> Result<()> {
    let rows = compare_policies(&config, &workload, &kinds).await?;

    if json {
        println!("{}", serde_json::to_string_pretty(&rows)?);
        return Ok(());
    }

    println!(
        "{:<16} {:>10} {:>10} {:>14} {:>10} {:>12} {:>12}",
        "POLICY", "MAKESPAN", "COMPLETED", "UNSCHEDULABLE", "MEAN WAIT", "UTILIZATION", "WALL TIME"
    );
    println!("{}", "-".repeat(90));
    for row in &rows {
        let r = &row.report;
        println!(
            "{:<16} {:>10.2} {:>10} {:>14} {:>10.2} {:>11.1}% {:>11.4}s",
            r.policy,
            r.makespan,
            r.completed,
            r.unschedulable,
            r.mean_wait,
            r.utilization * 100.0,
            row.wall_time_secs
        );
    }

    Ok(())
}

/// Simulate every policy on its own copy of the workload
pub async fn compare_policies(
    config: &SimulationConfig,
    workload: &Workload,
    kinds: &[PolicyKind],
) -> Result<Vec<ComparisonRow>> {
    let handles: Vec<_> = kinds
        .iter()
        .map(|&kind| {
            let mut config = config.clone();
            config.algorithm = kind;
            tokio::spawn(simulate(config, workload.tasks.clone()))
        })
        .collect();

    let mut rows = Vec::with_capacity(handles.len());
    for handle in handles {
        let (outcome, wall_time) = handle.await??;
        rows.push(ComparisonRow {
            report: SimulationReport::from_outcome(&outcome),
            wall_time_secs: wall_time.as_secs_f64(),
        });
    }
    Ok(rows)
}

/// Show the effective configuration
pub fn show_config(config: &SimulationConfig) -> Result<()> {
    print!("{}", render_config(config)?);
    Ok(())
}

/// Render the config as TOML
///
/// TOML has no null, so a disabled cutoff is written as a comment; loading
/// the output back restores the default limit.
pub fn render_config(config: &SimulationConfig) -> Result<String> {
    let mut rendered = String::new();
    if config.duration_limit.is_none() {
        rendered.push_str("# duration_limit: disabled (pass --no-duration-limit to keep it off)\n");
    }
    rendered.push_str(&toml::to_string_pretty(config)?);
    Ok(rendered)
}

fn print_summary(report: &SimulationReport, outcome: &SimulationOutcome, wall_time: Duration) {
    let total_memory: f64 = outcome
        .cluster
        .npus()
        .iter()
        .map(|n| n.memory_capacity_gb)
        .sum();

    println!("Policy: {}", report.policy);
    println!(
        "Cluster: {} NPUs, {} GB total",
        outcome.cluster.len(),
        total_memory
    );
    println!(
        "Tasks: {} total, {} completed, {} unschedulable",
        report.total_tasks, report.completed, report.unschedulable
    );
    println!("Events processed: {}", report.events);
    println!("Makespan: {:.2} s", report.makespan);
    println!("Mean wait: {:.2} s", report.mean_wait);
    println!("Mean turnaround: {:.2} s", report.mean_turnaround);
    println!("Utilization: {:.1}%", report.utilization * 100.0);
    println!("Simulation time (real): {:.4} s", wall_time.as_secs_f64());
    if report.anomalies > 0 {
        println!("Anomalies: {}", report.anomalies);
    }
}

fn print_placements(outcome: &SimulationOutcome) {
    if outcome.completed.is_empty() {
        println!("\nNo tasks were scheduled");
        return;
    }

    let mut tasks: Vec<&Task> = outcome.completed.iter().collect();
    tasks.sort_by(|a, b| {
        a.start_time
            .unwrap_or_default()
            .total_cmp(&b.start_time.unwrap_or_default())
            .then_with(|| a.job_id.cmp(&b.job_id))
    });

    println!();
    println!(
        "{:<20} {:<14} {:>10} {:>10} {:>10}  {}",
        "JOB", "KIND", "ARRIVAL", "START", "END", "NPUS"
    );
    println!("{}", "-".repeat(90));
    for t in tasks {
        println!(
            "{:<20} {:<14} {:>10.2} {:>10.2} {:>10.2}  {}",
            t.job_id,
            t.kind.to_string(),
            t.arrival_time,
            t.start_time.unwrap_or_default(),
            t.end_time.unwrap_or_default(),
            t.allocated_npu_ids.join(",")
        );
    }
}

fn print_events(outcome: &SimulationOutcome) {
    println!("\nEvents:");
    for record in &outcome.log {
        println!(
            "  {:>10.2}  {:<16} {}",
            record.time,
            record.event_kind.to_string(),
            record.task_id
        );
    }
}

fn print_unschedulable(outcome: &SimulationOutcome) {
    if outcome.unschedulable.is_empty() {
        return;
    }
    println!("\nUnschedulable:");
    for u in &outcome.unschedulable {
        println!("  {} ({})", u.job_id, u.reason);
    }
}
