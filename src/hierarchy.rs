//! Progress roll-up through the task hierarchy.

use crate::task::{TaskId, TaskRecord};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap, HashSet};
use thiserror::Error;
use tracing::debug;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum HierarchyError {
    #[error("parent chain of task {task} loops back on itself")]
    ParentCycle { task: TaskId },
    #[error("task {task} references unknown parent {parent}")]
    UnknownParent { task: TaskId, parent: TaskId },
    #[error("task {0} does not exist")]
    UnknownTask(TaskId),
    #[error("task {0} has children; its progress is derived from them")]
    NotALeaf(TaskId),
    #[error("task {task} progress {value} is outside 0..=100")]
    ProgressOutOfRange { task: TaskId, value: u8 },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProgressUpdate {
    pub task_id: TaskId,
    pub old: u8,
    pub new: u8,
}

/// Round-half-up mean of percentages; an empty input averages to 0.
fn rounded_mean<I>(values: I) -> u8
where
    I: IntoIterator<Item = u8>,
{
    let (sum, count) = values
        .into_iter()
        .fold((0u64, 0u64), |(sum, count), v| (sum + u64::from(v.min(100)), count + 1));
    if count == 0 {
        return 0;
    }
    // (sum / count) + 1/2, floored
    ((2 * sum + count) / (2 * count)) as u8
}

/// A leaf keeps its stored progress; a parent gets the rounded mean of its direct children.
pub fn aggregate_progress(task: &TaskRecord, children: &[TaskRecord]) -> u8 {
    if children.is_empty() {
        return task.progress_percentage;
    }
    rounded_mean(children.iter().map(|child| child.progress_percentage))
}

/// Parent/child structure of one project with the current progress of every task.
#[derive(Debug, Clone, Default)]
pub struct ProgressTree {
    progress: BTreeMap<TaskId, u8>,
    parent: HashMap<TaskId, TaskId>,
    children: HashMap<TaskId, Vec<TaskId>>,
}

impl ProgressTree {
    pub fn from_tasks(tasks: &[TaskRecord]) -> Result<Self, HierarchyError> {
        let mut tree = ProgressTree::default();
        for task in tasks {
            if task.progress_percentage > 100 {
                return Err(HierarchyError::ProgressOutOfRange {
                    task: task.id,
                    value: task.progress_percentage,
                });
            }
            tree.progress.insert(task.id, task.progress_percentage);
        }
        for task in tasks {
            let Some(parent) = task.parent_id else {
                continue;
            };
            if !tree.progress.contains_key(&parent) {
                return Err(HierarchyError::UnknownParent {
                    task: task.id,
                    parent,
                });
            }
            tree.parent.insert(task.id, parent);
            tree.children.entry(parent).or_default().push(task.id);
        }
        for kids in tree.children.values_mut() {
            kids.sort();
        }
        tree.check_acyclic()?;
        Ok(tree)
    }

    fn check_acyclic(&self) -> Result<(), HierarchyError> {
        let mut cleared: HashSet<TaskId> = HashSet::new();
        for &start in self.progress.keys() {
            let mut seen = HashSet::new();
            let mut current = Some(start);
            while let Some(id) = current {
                if cleared.contains(&id) {
                    break;
                }
                if !seen.insert(id) {
                    return Err(HierarchyError::ParentCycle { task: id });
                }
                current = self.parent.get(&id).copied();
            }
            cleared.extend(seen);
        }
        Ok(())
    }

    pub fn progress(&self, id: TaskId) -> Option<u8> {
        self.progress.get(&id).copied()
    }

    pub fn is_leaf(&self, id: TaskId) -> bool {
        self.children.get(&id).is_none_or(|kids| kids.is_empty())
    }

    pub fn children(&self, id: TaskId) -> &[TaskId] {
        self.children.get(&id).map_or(&[], Vec::as_slice)
    }

    /// Aggregated progress of `id` computed from its leaves, without touching stored values.
    pub fn aggregate(&self, id: TaskId) -> Result<u8, HierarchyError> {
        let stored = self.progress(id).ok_or(HierarchyError::UnknownTask(id))?;
        let kids = self.children(id);
        if kids.is_empty() {
            return Ok(stored);
        }
        let mut values = Vec::with_capacity(kids.len());
        for &child in kids {
            values.push(self.aggregate(child)?);
        }
        Ok(rounded_mean(values))
    }

    /// Recompute every parent bottom-up and return the values that changed.
    pub fn rollup(&mut self) -> Vec<ProgressUpdate> {
        let mut parents: Vec<(usize, TaskId)> = self
            .children
            .keys()
            .map(|&id| (self.depth(id), id))
            .collect();
        // deepest first so every child is final before its parent
        parents.sort_by(|a, b| b.0.cmp(&a.0).then(a.1.cmp(&b.1)));

        let mut updates = Vec::new();
        for (_, id) in parents {
            if let Some(update) = self.recompute(id) {
                updates.push(update);
            }
        }
        debug!(changed = updates.len(), "progress rollup finished");
        updates
    }

    /// Set a leaf's progress and propagate the change through every ancestor to the root.
    pub fn set_leaf_progress(
        &mut self,
        id: TaskId,
        percentage: u8,
    ) -> Result<Vec<ProgressUpdate>, HierarchyError> {
        let old = self.progress(id).ok_or(HierarchyError::UnknownTask(id))?;
        if !self.is_leaf(id) {
            return Err(HierarchyError::NotALeaf(id));
        }
        if percentage > 100 {
            return Err(HierarchyError::ProgressOutOfRange {
                task: id,
                value: percentage,
            });
        }

        let mut updates = Vec::new();
        if old != percentage {
            self.progress.insert(id, percentage);
            updates.push(ProgressUpdate {
                task_id: id,
                old,
                new: percentage,
            });
        }
        let mut current = self.parent.get(&id).copied();
        while let Some(ancestor) = current {
            if let Some(update) = self.recompute(ancestor) {
                updates.push(update);
            }
            current = self.parent.get(&ancestor).copied();
        }
        Ok(updates)
    }

    /// Write the tree's values back onto `tasks`.
    pub fn apply_to(&self, tasks: &mut [TaskRecord]) {
        for task in tasks {
            if let Some(pct) = self.progress(task.id) {
                task.progress_percentage = pct;
            }
        }
    }

    fn recompute(&mut self, id: TaskId) -> Option<ProgressUpdate> {
        let kids = self.children.get(&id)?;
        let new = rounded_mean(kids.iter().filter_map(|kid| self.progress.get(kid).copied()));
        let old = self.progress.insert(id, new)?;
        (old != new).then_some(ProgressUpdate {
            task_id: id,
            old,
            new,
        })
    }

    fn depth(&self, id: TaskId) -> usize {
        let mut depth = 0;
        let mut current = self.parent.get(&id);
        while let Some(parent) = current {
            depth += 1;
            current = self.parent.get(parent);
        }
        depth
    }
}
