//! Whole-run properties checked over generated workloads

use npusim_core::{Cluster, Npu, PolicyKind, Task, TaskKind};
use npusim_engine::{SimulationOutcome, Simulator};
use npusim_scheduler::build_policy;
use rand::prelude::*;
use rand_pcg::Pcg64;
use std::collections::HashMap;

fn mixed_cluster() -> Cluster {
    let mut cluster = Cluster::new();
    for i in 0..6 {
        let memory = if i % 3 == 0 { 64.0 } else { 32.0 };
        cluster
            .add_npu(Npu::new(format!("npu_{}", i), format!("node_{}", i / 3), memory))
            .unwrap();
    }
    cluster
}

fn workload(seed: u64, n: usize) -> Vec<Task> {
    let mut rng = Pcg64::seed_from_u64(seed);
    let kinds = [TaskKind::Training, TaskKind::LoraFinetune, TaskKind::Inference];
    (0..n)
        .map(|i| {
            Task::new(
                format!("job_{}", i),
                kinds[i % 3],
                rng.gen_range(0..=40) as f64,
                rng.gen_range(1..=15) as f64,
                rng.gen_range(0..=48) as f64,
                rng.gen_range(1..=4),
            )
        })
        .collect()
}

fn run(kind: PolicyKind, tasks: Vec<Task>, limit: Option<f64>) -> SimulationOutcome {
    Simulator::new(mixed_cluster(), build_policy(kind), tasks)
        .unwrap()
        .with_duration_limit(limit)
        .run()
}

#[test]
fn conservation_holds_for_every_policy() {
    for kind in PolicyKind::ALL {
        for seed in 1..6 {
            for limit in [None, Some(25.0)] {
                let outcome = run(kind, workload(seed, 30), limit);
                assert_eq!(
                    outcome.completed.len() + outcome.pending.len(),
                    30,
                    "policy {} seed {} limit {:?}",
                    kind,
                    seed,
                    limit
                );
                assert_eq!(outcome.unschedulable.len(), outcome.pending.len());
            }
        }
    }
}

#[test]
fn capacity_invariant_holds_at_every_step() {
    for kind in [PolicyKind::Fifo, PolicyKind::BestFit] {
        let mut sim = Simulator::new(mixed_cluster(), build_policy(kind), workload(7, 40)).unwrap();
        while sim.step() {
            for npu in sim.cluster().npus() {
                assert!(npu.current_memory_usage >= 0.0, "{} went negative", npu.npu_id);
                assert!(
                    npu.current_memory_usage <= npu.memory_capacity_gb,
                    "{} over capacity",
                    npu.npu_id
                );
                assert_eq!(npu.is_idle(), npu.running_tasks.is_empty());
            }
        }
    }
}

#[test]
fn no_device_runs_two_tasks_at_once() {
    for kind in [PolicyKind::Fifo, PolicyKind::BestFit] {
        for seed in 1..6 {
            let outcome = run(kind, workload(seed, 30), None);
            let mut by_device: HashMap<&str, Vec<(f64, f64)>> = HashMap::new();
            for task in &outcome.completed {
                assert_eq!(task.allocated_npu_ids.len(), task.npu_requirement as usize);
                let interval = (task.start_time.unwrap(), task.end_time.unwrap());
                for npu in &task.allocated_npu_ids {
                    by_device.entry(npu.as_str()).or_default().push(interval);
                }
            }
            for (npu, mut intervals) in by_device {
                intervals.sort_by(|a, b| a.0.total_cmp(&b.0));
                for pair in intervals.windows(2) {
                    assert!(
                        pair[0].1 <= pair[1].0,
                        "overlap on {} under {}: {:?}",
                        npu,
                        kind,
                        pair
                    );
                }
            }
        }
    }
}

#[test]
fn identical_inputs_give_identical_runs() {
    for kind in PolicyKind::ALL {
        let first = run(kind, workload(42, 50), Some(60.0));
        let second = run(kind, workload(42, 50), Some(60.0));
        assert_eq!(first.log, second.log);
        assert_eq!(first.placements(), second.placements());
        assert_eq!(first.cluster, second.cluster);
        assert_eq!(first.unschedulable, second.unschedulable);
    }
}

#[test]
fn fifo_places_earlier_arrival_when_only_one_fits() {
    // Both wait behind `blocker`; when it finishes only one device frees up.
    let tasks = vec![
        Task::new("blocker", TaskKind::Training, 0.0, 10.0, 30.0, 1),
        Task::new("a", TaskKind::Inference, 1.0, 5.0, 30.0, 1),
        Task::new("b", TaskKind::Inference, 2.0, 5.0, 30.0, 1),
    ];
    let cluster = Cluster::homogeneous(1, 32.0, 8);
    let outcome = Simulator::new(cluster, build_policy(PolicyKind::Fifo), tasks)
        .unwrap()
        .run();

    let start = |id: &str| {
        outcome
            .completed
            .iter()
            .find(|t| t.job_id == id)
            .and_then(|t| t.start_time)
            .unwrap()
    };
    assert_eq!(start("a"), 10.0);
    assert_eq!(start("b"), 15.0);
}

#[test]
fn unplaceable_task_is_skipped_for_the_pass() {
    // `wide` needs both devices while `hold` has one; `narrow` arrives
    // later but takes the free device because `wide` cannot be placed.
    let tasks = vec![
        Task::new("hold", TaskKind::Training, 0.0, 10.0, 8.0, 1),
        Task::new("wide", TaskKind::Training, 1.0, 5.0, 8.0, 2),
        Task::new("narrow", TaskKind::Inference, 2.0, 1.0, 8.0, 1),
    ];
    let outcome = Simulator::new(
        Cluster::homogeneous(2, 32.0, 8),
        build_policy(PolicyKind::Fifo),
        tasks,
    )
    .unwrap()
    .run();

    let narrow = outcome.completed.iter().find(|t| t.job_id == "narrow").unwrap();
    let wide = outcome.completed.iter().find(|t| t.job_id == "wide").unwrap();
    assert_eq!(narrow.start_time, Some(2.0));
    assert_eq!(wide.start_time, Some(10.0));
}
