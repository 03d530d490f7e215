//! Discrete-event simulation loop

use npusim_core::{validate_tasks, Cluster, SimResult, SimulationConfig, Task, TaskState};
use npusim_scheduler::{build_policy, Allocation, SchedulingPolicy};
use std::collections::{HashMap, HashSet};
use tracing::{debug, error, info, warn};

use crate::allocator::NpuAllocator;
use crate::event::{Event, EventKind, EventQueue, EventRecord};
use crate::outcome::{Anomaly, SimulationOutcome, Unschedulable, UnschedulableReason};

/// Drives a policy over a workload in simulated time
///
/// Each step pops the earliest event, applies it, then asks the policy for
/// allocations once. Ties at the same time are resolved completions first,
/// then by insertion order, so identical inputs always give identical logs.
pub struct Simulator {
    allocator: NpuAllocator,
    policy: Box<dyn SchedulingPolicy>,
    /// All tasks, addressed by slot; events refer to slots
    tasks: Vec<Task>,
    slots: HashMap<String, usize>,
    queue: EventQueue,
    pending: Vec<usize>,
    completed: Vec<usize>,
    /// Arrivals discarded because they fell after the cutoff
    dropped: Vec<usize>,
    /// Pending tasks the policy declined on a fully idle cluster
    stalled: HashSet<usize>,
    current_time: f64,
    duration_limit: Option<f64>,
    cutoff_reached: bool,
    log: Vec<EventRecord>,
    anomalies: Vec<Anomaly>,
}

impl Simulator {
    /// Validate the workload against the cluster and queue every arrival
    pub fn new(
        cluster: Cluster,
        policy: Box<dyn SchedulingPolicy>,
        tasks: Vec<Task>,
    ) -> SimResult<Self> {
        validate_tasks(&tasks, &cluster)?;

        let mut queue = EventQueue::new();
        let mut slots = HashMap::with_capacity(tasks.len());
        for (slot, task) in tasks.iter().enumerate() {
            queue.push(task.arrival_time, EventKind::TaskArrival, slot);
            slots.insert(task.job_id.clone(), slot);
        }

        Ok(Self {
            allocator: NpuAllocator::new(cluster),
            policy,
            tasks,
            slots,
            queue,
            pending: Vec::new(),
            completed: Vec::new(),
            dropped: Vec::new(),
            stalled: HashSet::new(),
            current_time: 0.0,
            duration_limit: None,
            cutoff_reached: false,
            log: Vec::new(),
            anomalies: Vec::new(),
        })
    }

    /// Build the cluster and policy described by `config`
    pub fn from_config(config: &SimulationConfig, tasks: Vec<Task>) -> SimResult<Self> {
        let cluster = config.build_cluster()?;
        let policy = build_policy(config.algorithm);
        Ok(Self::new(cluster, policy, tasks)?.with_duration_limit(config.duration_limit))
    }

    /// Stop admitting events after `limit` simulated seconds
    pub fn with_duration_limit(mut self, limit: Option<f64>) -> Self {
        self.duration_limit = limit;
        self
    }

    pub fn current_time(&self) -> f64 {
        self.current_time
    }

    pub fn cluster(&self) -> &Cluster {
        self.allocator.cluster()
    }

    pub fn log(&self) -> &[EventRecord] {
        &self.log
    }

    pub fn pending_count(&self) -> usize {
        self.pending.len()
    }

    pub fn completed_count(&self) -> usize {
        self.completed.len()
    }

    /// Process the next admitted event
    ///
    /// Returns `false` once the queue is empty. Arrivals past the cutoff are
    /// discarded without being logged; completions past it still drain but
    /// trigger no further allocation.
    pub fn step(&mut self) -> bool {
        while let Some(event) = self.queue.pop() {
            let past_cutoff = self.duration_limit.is_some_and(|limit| event.time > limit);
            if past_cutoff {
                self.cutoff_reached = true;
            }

            if past_cutoff && event.kind == EventKind::TaskArrival {
                warn!(
                    job_id = %self.tasks[event.task].job_id,
                    arrival = event.time,
                    "Arrival after cutoff dropped"
                );
                self.dropped.push(event.task);
                continue;
            }

            self.apply(event, past_cutoff);
            return true;
        }
        false
    }

    /// Run until the queue drains and collect the results
    pub fn run(mut self) -> SimulationOutcome {
        info!(
            policy = self.policy.name(),
            tasks = self.tasks.len(),
            npus = self.allocator.cluster().len(),
            duration_limit = ?self.duration_limit,
            "Starting simulation"
        );

        while self.step() {}

        self.finish()
    }

    fn apply(&mut self, event: Event, past_cutoff: bool) {
        debug_assert!(event.time >= self.current_time, "simulated time went backwards");
        self.current_time = event.time;

        let task_id = self.tasks[event.task].job_id.clone();
        debug!(time = event.time, event = %event.kind, job_id = %task_id, "Processing event");
        self.log.push(EventRecord {
            time: event.time,
            event_kind: event.kind,
            task_id,
        });

        match event.kind {
            EventKind::TaskArrival => self.pending.push(event.task),
            EventKind::TaskCompletion => {
                let anomalies = self
                    .allocator
                    .release(&self.tasks[event.task], self.current_time);
                self.anomalies.extend(anomalies);
                self.tasks[event.task].state = TaskState::Completed;
                self.completed.push(event.task);
            }
        }

        if !past_cutoff {
            self.attempt_allocation();
        }
    }

    /// Ask the policy once and commit whatever it returns
    fn attempt_allocation(&mut self) {
        if self.pending.is_empty() {
            return;
        }

        let allocations = {
            let pending: Vec<&Task> = self.pending.iter().map(|&slot| &self.tasks[slot]).collect();
            self.policy
                .schedule(&pending, self.allocator.cluster(), self.current_time)
        };

        for allocation in allocations {
            self.commit(allocation);
        }

        // Nothing is running, so no later completion can make room
        let cluster = self.allocator.cluster();
        if cluster.idle_count() == cluster.len() {
            self.stalled.extend(self.pending.iter().copied());
        }
    }

    fn commit(&mut self, allocation: Allocation) {
        let now = self.current_time;

        let slot = match self.slots.get(&allocation.job_id).copied() {
            Some(slot) if self.pending.contains(&slot) => slot,
            Some(_) => return self.reject(allocation.job_id, "task is not pending".to_string()),
            None => return self.reject(allocation.job_id, "unknown task".to_string()),
        };

        if let Err(e) = self.allocator.commit(&self.tasks[slot], &allocation.npu_ids) {
            return self.reject(allocation.job_id, e.to_string());
        }

        let task = &mut self.tasks[slot];
        let end = now + task.duration;
        task.start_time = Some(now);
        task.end_time = Some(end);
        task.allocated_npu_ids = allocation.npu_ids;
        task.state = TaskState::Scheduled;

        self.pending.retain(|&p| p != slot);
        self.stalled.remove(&slot);
        self.queue.push(end, EventKind::TaskCompletion, slot);

        debug!(
            job_id = %task.job_id,
            npus = ?task.allocated_npu_ids,
            start = now,
            end,
            "Task scheduled"
        );
    }

    fn reject(&mut self, job_id: String, reason: String) {
        error!(
            policy = self.policy.name(),
            job_id = %job_id,
            reason = %reason,
            "Policy returned an invalid allocation"
        );
        self.anomalies.push(Anomaly::PolicyViolation {
            time: self.current_time,
            job_id,
            reason,
        });
    }

    fn finish(mut self) -> SimulationOutcome {
        debug_assert!(self.queue.is_empty(), "run finished with queued events");

        let mut unschedulable = Vec::new();
        for &slot in &self.pending {
            let reason = if self.cutoff_reached && !self.stalled.contains(&slot) {
                UnschedulableReason::CutoffReached
            } else {
                UnschedulableReason::Stalled
            };
            let job_id = self.tasks[slot].job_id.clone();
            warn!(job_id = %job_id, reason = %reason, "Task never scheduled");
            if reason == UnschedulableReason::Stalled {
                self.anomalies.push(Anomaly::StalledTask {
                    time: self.current_time,
                    job_id: job_id.clone(),
                });
            }
            unschedulable.push(Unschedulable { job_id, reason });
        }
        for &slot in &self.dropped {
            unschedulable.push(Unschedulable {
                job_id: self.tasks[slot].job_id.clone(),
                reason: UnschedulableReason::CutoffReached,
            });
        }

        let mut tasks: Vec<Option<Task>> = self.tasks.into_iter().map(Some).collect();
        let completed: Vec<Task> = self
            .completed
            .iter()
            .filter_map(|&slot| tasks[slot].take())
            .collect();
        let pending: Vec<Task> = self
            .pending
            .iter()
            .chain(self.dropped.iter())
            .filter_map(|&slot| tasks[slot].take())
            .collect();
        debug_assert!(tasks.iter().all(Option::is_none), "task left running at end of run");

        let outcome = SimulationOutcome {
            policy: self.policy.name().to_string(),
            log: self.log,
            completed,
            pending,
            cluster: self.allocator.into_cluster(),
            unschedulable,
            anomalies: self.anomalies,
            final_time: self.current_time,
            duration_limit: self.duration_limit,
        };

        info!(
            policy = %outcome.policy,
            completed = outcome.completed.len(),
            unschedulable = outcome.unschedulable.len(),
            makespan = outcome.makespan(),
            events = outcome.log.len(),
            "Simulation finished"
        );

        outcome
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use npusim_core::{Npu, NpuStatus, SimError, TaskKind};
    use npusim_scheduler::FifoPolicy;

    fn task(id: &str, arrival: f64, duration: f64, mem: f64, npus: u32) -> Task {
        Task::new(id, TaskKind::Training, arrival, duration, mem, npus)
    }

    fn fifo(cluster: Cluster, tasks: Vec<Task>) -> Simulator {
        Simulator::new(cluster, Box::new(FifoPolicy), tasks).unwrap()
    }

    #[test]
    fn test_reference_scenario() {
        let tasks = (0..5)
            .map(|i| task(&format!("job_{}", i), i as f64, 5.0, 10.0, 1))
            .collect();
        let outcome = fifo(Cluster::homogeneous(4, 32.0, 8), tasks).run();

        assert_eq!(outcome.completed.len(), 5);
        assert!(outcome.pending.is_empty());
        assert_eq!(outcome.log.len(), 10);
        assert_eq!(outcome.makespan(), 10.0);
        assert_eq!(outcome.final_time, 10.0);

        let job4 = outcome.completed.iter().find(|t| t.job_id == "job_4").unwrap();
        assert_eq!(job4.start_time, Some(5.0));
        assert_eq!(job4.end_time, Some(10.0));
        // job_0 finished on npu_0 at t=5 and job_4 took its place
        assert_eq!(job4.allocated_npu_ids, vec!["npu_0".to_string()]);

        let first_four: Vec<&Task> = outcome
            .completed
            .iter()
            .filter(|t| t.job_id != "job_4")
            .collect();
        for t in &first_four {
            assert_eq!(t.start_time, Some(t.arrival_time));
        }

        // At t=5 the completion is processed before anything else
        let at_five: Vec<&EventRecord> = outcome.log.iter().filter(|r| r.time == 5.0).collect();
        assert_eq!(at_five.len(), 1);
        assert_eq!(at_five[0].event_kind, EventKind::TaskCompletion);
        assert_eq!(at_five[0].task_id, "job_0");

        assert!(outcome.anomalies.is_empty());
        assert!(outcome.cluster.npus().iter().all(|n| n.status == NpuStatus::Idle));
        assert_eq!(outcome.cluster.total_memory_usage(), 0.0);
    }

    #[test]
    fn test_completion_frees_device_for_same_time_arrival() {
        let tasks = vec![task("a", 0.0, 5.0, 10.0, 1), task("b", 5.0, 1.0, 10.0, 1)];
        let outcome = fifo(Cluster::homogeneous(1, 32.0, 8), tasks).run();

        let kinds: Vec<(EventKind, &str)> = outcome
            .log
            .iter()
            .map(|r| (r.event_kind, r.task_id.as_str()))
            .collect();
        assert_eq!(
            kinds,
            vec![
                (EventKind::TaskArrival, "a"),
                (EventKind::TaskCompletion, "a"),
                (EventKind::TaskArrival, "b"),
                (EventKind::TaskCompletion, "b"),
            ]
        );
        let b = outcome.completed.iter().find(|t| t.job_id == "b").unwrap();
        assert_eq!(b.start_time, Some(5.0));
    }

    #[test]
    fn test_rejects_invalid_workload_before_running() {
        let tasks = vec![task("a", 0.0, 1.0, 1.0, 1), task("a", 1.0, 1.0, 1.0, 1)];
        let result = Simulator::new(Cluster::homogeneous(2, 32.0, 8), Box::new(FifoPolicy), tasks);
        assert!(matches!(result, Err(SimError::DuplicateTask(_))));

        let tasks = vec![task("wide", 0.0, 1.0, 1.0, 3)];
        let result = Simulator::new(Cluster::homogeneous(2, 32.0, 8), Box::new(FifoPolicy), tasks);
        assert!(matches!(result, Err(SimError::InvalidTask { .. })));
    }

    #[test]
    fn test_stalled_task_reported() {
        // Nothing ever gets placed, so the queue drains with both pending
        let tasks = vec![task("a", 0.0, 1.0, 1.0, 1), task("b", 2.0, 1.0, 1.0, 1)];
        let outcome = Simulator::new(
            Cluster::homogeneous(2, 32.0, 8),
            Box::new(npusim_scheduler::AdapterAwarePolicy),
            tasks,
        )
        .unwrap()
        .run();

        assert!(outcome.completed.is_empty());
        assert_eq!(outcome.pending.len(), 2);
        assert_eq!(outcome.log.len(), 2);
        assert!(outcome
            .unschedulable
            .iter()
            .all(|u| u.reason == UnschedulableReason::Stalled));
        let stalled = outcome
            .anomalies
            .iter()
            .filter(|a| matches!(a, Anomaly::StalledTask { .. }))
            .count();
        assert_eq!(stalled, 2);
    }

    #[test]
    fn test_cutoff_drops_late_arrivals_and_drains_running() {
        let tasks = vec![
            task("early", 0.0, 50.0, 1.0, 1),
            task("blocked", 1.0, 5.0, 1.0, 1),
            task("late", 200.0, 5.0, 1.0, 1),
        ];
        let outcome = fifo(Cluster::homogeneous(1, 32.0, 8), tasks)
            .with_duration_limit(Some(20.0))
            .run();

        // `early` runs past the cutoff and still completes
        assert_eq!(outcome.completed.len(), 1);
        assert_eq!(outcome.completed[0].job_id, "early");
        assert_eq!(outcome.makespan(), 50.0);

        // `blocked` would have started at t=50, after the cutoff
        let pending: Vec<&str> = outcome.pending.iter().map(|t| t.job_id.as_str()).collect();
        assert_eq!(pending, vec!["blocked", "late"]);
        assert!(outcome
            .unschedulable
            .iter()
            .all(|u| u.reason == UnschedulableReason::CutoffReached));

        // The dropped arrival is not in the log
        assert!(outcome.log.iter().all(|r| r.task_id != "late"));
        assert_eq!(outcome.completed.len() + outcome.pending.len(), 3);
    }

    #[test]
    fn test_infeasible_task_stalls_even_with_cutoff() {
        let mut cluster = Cluster::new();
        cluster.add_npu(Npu::new("big", "node_0", 64.0)).unwrap();
        cluster.add_npu(Npu::new("small", "node_0", 32.0)).unwrap();
        // Two devices with 48 GB each never exist, even on an idle cluster
        let tasks = vec![task("never", 0.0, 5.0, 48.0, 2), task("late", 500.0, 5.0, 1.0, 1)];
        let outcome = fifo(cluster, tasks).with_duration_limit(Some(100.0)).run();

        assert_eq!(
            outcome.unschedulable,
            vec![
                Unschedulable {
                    job_id: "never".to_string(),
                    reason: UnschedulableReason::Stalled,
                },
                Unschedulable {
                    job_id: "late".to_string(),
                    reason: UnschedulableReason::CutoffReached,
                },
            ]
        );
        assert_eq!(
            outcome.anomalies,
            vec![Anomaly::StalledTask {
                time: 0.0,
                job_id: "never".to_string(),
            }]
        );
    }

    #[test]
    fn test_cutoff_boundary_is_inclusive() {
        let tasks = vec![
            task("on_limit", 10.0, 5.0, 1.0, 1),
            task("after_limit", 10.0 + 1e-6, 5.0, 1.0, 1),
        ];
        let outcome = fifo(Cluster::homogeneous(2, 32.0, 8), tasks)
            .with_duration_limit(Some(10.0))
            .run();

        // An arrival at exactly the limit is admitted and placed
        assert_eq!(outcome.completed.len(), 1);
        assert_eq!(outcome.completed[0].job_id, "on_limit");
        assert_eq!(outcome.completed[0].start_time, Some(10.0));
        assert_eq!(outcome.completed[0].end_time, Some(15.0));

        assert_eq!(outcome.pending.len(), 1);
        assert_eq!(outcome.pending[0].job_id, "after_limit");
        assert_eq!(
            outcome.unschedulable[0].reason,
            UnschedulableReason::CutoffReached
        );
        assert!(outcome.log.iter().all(|r| r.task_id != "after_limit"));
    }

    #[test]
    fn test_step_advances_one_event() {
        let tasks = vec![task("a", 0.0, 2.0, 1.0, 1), task("b", 1.0, 2.0, 1.0, 1)];
        let mut sim = fifo(Cluster::homogeneous(1, 32.0, 8), tasks);

        assert!(sim.step());
        assert_eq!(sim.current_time(), 0.0);
        assert_eq!(sim.cluster().idle_count(), 0);

        assert!(sim.step());
        assert_eq!(sim.current_time(), 1.0);
        assert_eq!(sim.pending_count(), 1);

        assert!(sim.step());
        assert_eq!(sim.current_time(), 2.0);
        assert_eq!(sim.completed_count(), 1);
        assert_eq!(sim.pending_count(), 0);

        assert!(sim.step());
        assert!(!sim.step());
        assert_eq!(sim.log().len(), 4);
    }

    struct GreedyPolicy;

    impl SchedulingPolicy for GreedyPolicy {
        // Hands every pending task the first device, ignoring collisions
        fn schedule(&self, pending: &[&Task], cluster: &Cluster, _now: f64) -> Vec<Allocation> {
            pending
                .iter()
                .map(|t| Allocation::new(t.job_id.clone(), vec![cluster.npus()[0].npu_id.clone()]))
                .collect()
        }

        fn name(&self) -> &str {
            "greedy"
        }
    }

    #[test]
    fn test_policy_violation_recorded_not_committed() {
        let tasks = vec![task("a", 0.0, 5.0, 1.0, 1), task("b", 0.0, 5.0, 1.0, 1)];
        let outcome = Simulator::new(Cluster::homogeneous(2, 32.0, 8), Box::new(GreedyPolicy), tasks)
            .unwrap()
            .run();

        // `b` collides with `a` on npu_0 at t=0, then gets it at t=5
        assert!(outcome.anomalies.iter().any(|a| matches!(
            a,
            Anomaly::PolicyViolation { job_id, .. } if job_id == "b"
        )));
        assert_eq!(outcome.completed.len(), 2);
        let b = outcome.completed.iter().find(|t| t.job_id == "b").unwrap();
        assert_eq!(b.start_time, Some(5.0));
    }

    #[test]
    fn test_from_config() {
        let mut config = SimulationConfig::default();
        config.total_npus = 2;
        config.duration_limit = None;
        let sim = Simulator::from_config(&config, npusim_core::Workload::mock(4).into_tasks()).unwrap();
        let outcome = sim.run();
        assert_eq!(outcome.policy, "fifo");
        assert_eq!(outcome.completed.len(), 4);
        assert_eq!(outcome.duration_limit, None);
    }
}
