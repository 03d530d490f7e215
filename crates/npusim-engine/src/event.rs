//! Simulation events and the ordered event queue

use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::BinaryHeap;

/// Kind of simulation event
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EventKind {
    /// A task enters the pending set
    TaskArrival,
    /// A running task finishes and frees its devices
    TaskCompletion,
}

impl EventKind {
    /// Tie-break rank at equal times: completions free devices before
    /// arrivals at the same instant are considered.
    fn rank(self) -> u8 {
        match self {
            EventKind::TaskCompletion => 0,
            EventKind::TaskArrival => 1,
        }
    }
}

impl std::fmt::Display for EventKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EventKind::TaskArrival => write!(f, "TASK_ARRIVAL"),
            EventKind::TaskCompletion => write!(f, "TASK_COMPLETION"),
        }
    }
}

/// A queued event referring to a task by its slot in the engine
#[derive(Debug, Clone)]
pub struct Event {
    pub time: f64,
    pub kind: EventKind,
    pub task: usize,
    seq: u64,
}

// Min-heap by (time, kind rank, insertion sequence)
impl PartialEq for Event {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}
impl Eq for Event {}
impl PartialOrd for Event {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}
impl Ord for Event {
    fn cmp(&self, other: &Self) -> Ordering {
        // Reversed so BinaryHeap pops the earliest event first
        other
            .time
            .total_cmp(&self.time)
            .then(other.kind.rank().cmp(&self.kind.rank()))
            .then(other.seq.cmp(&self.seq))
    }
}

/// Priority queue of pending events
#[derive(Debug, Default)]
pub struct EventQueue {
    heap: BinaryHeap<Event>,
    next_seq: u64,
}

impl EventQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue an event; same-time, same-kind events pop in push order
    pub fn push(&mut self, time: f64, kind: EventKind, task: usize) {
        let seq = self.next_seq;
        self.next_seq += 1;
        self.heap.push(Event {
            time,
            kind,
            task,
            seq,
        });
    }

    /// Remove the earliest event
    pub fn pop(&mut self) -> Option<Event> {
        self.heap.pop()
    }

    pub fn is_empty(&self) -> bool {
        self.heap.is_empty()
    }
}

/// One processed event, as exposed in the run log
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventRecord {
    pub time: f64,
    pub event_kind: EventKind,
    pub task_id: String,
}
