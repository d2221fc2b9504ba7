//! In-memory pending queue ordered by priority, FIFO within a priority band.

use std::cmp::Reverse;
use std::collections::{BTreeMap, HashMap};

use crate::core::task::{Task, TaskId, TaskPriority};

/// Ordering key: higher priority first, then earlier arrival.
type QueueKey = (Reverse<TaskPriority>, u64);

/// Pending tasks awaiting dispatch.
///
/// Unlike a heap, the queue can be scanned in dispatch order without
/// popping, so a task that does not fit yet keeps its place while later
/// tasks are considered. Removal by id is O(log n).
#[derive(Debug, Default)]
pub struct InMemoryQueue {
    tasks: BTreeMap<QueueKey, Task>,
    index: HashMap<TaskId, QueueKey>,
    next_seq: u64,
}

impl InMemoryQueue {
    /// Create an empty queue.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a task behind every queued task of the same priority.
    pub fn enqueue(&mut self, task: Task) {
        let key = (Reverse(task.priority()), self.next_seq);
        self.next_seq += 1;
        self.index.insert(task.id(), key);
        self.tasks.insert(key, task);
    }

    /// Queued task ids in dispatch order.
    #[must_use]
    pub fn ids_in_order(&self) -> Vec<TaskId> {
        self.tasks.values().map(Task::id).collect()
    }

    /// Borrow a queued task.
    #[must_use]
    pub fn get(&self, id: &TaskId) -> Option<&Task> {
        self.index.get(id).and_then(|key| self.tasks.get(key))
    }

    /// Remove a queued task.
    pub fn remove(&mut self, id: &TaskId) -> Option<Task> {
        let key = self.index.remove(id)?;
        self.tasks.remove(&key)
    }

    /// Remove and return every queued task in dispatch order.
    pub fn drain(&mut self) -> Vec<Task> {
        self.index.clear();
        std::mem::take(&mut self.tasks).into_values().collect()
    }

    /// Whether `id` is queued.
    #[must_use]
    pub fn contains(&self, id: &TaskId) -> bool {
        self.index.contains_key(id)
    }

    /// Iterate queued tasks in dispatch order.
    pub fn iter(&self) -> impl Iterator<Item = &Task> {
        self.tasks.values()
    }

    /// Current depth.
    #[must_use]
    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    /// Whether nothing is queued.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }
}
