//! Critical Path Method over a validated dependency graph.
//!
//! Both passes work in working-day offsets from the project origin (the first working day on
//! or after the requested project start). A task occupying offsets `[start, finish)` runs from
//! `add_working_days(origin, start)` through `add_working_days(origin, finish - 1)`; a
//! zero-duration task starts and finishes on the same day.

pub mod backward_pass;
pub mod forward_pass;

use crate::calendar::WorkCalendar;
use crate::dependency::{DependencyEdge, DependencyType};
use crate::error::ScheduleError;
use crate::graph::DependencyGraph;
use crate::task::TaskId;
use backward_pass::BackwardPass;
use chrono::{Duration, NaiveDate};
use forward_pass::ForwardPass;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use tracing::{debug, warn};

/// Computed CPM fields for one task.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskTiming {
    pub task_id: TaskId,
    pub duration: i64,
    pub earliest_start_offset: i64,
    pub earliest_finish_offset: i64,
    pub latest_start_offset: i64,
    pub latest_finish_offset: i64,
    pub earliest_start: NaiveDate,
    pub earliest_finish: NaiveDate,
    pub latest_start: NaiveDate,
    pub latest_finish: NaiveDate,
    pub slack: i64,
    pub is_critical: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ScheduleWarning {
    /// The schedule contradicts itself for this task, typically because of a deadline.
    NegativeSlack { task_id: TaskId, slack: i64 },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CriticalPathReport {
    /// First working day on or after the requested project start.
    pub project_start: NaiveDate,
    /// Last working day of the latest-finishing task.
    pub project_finish: NaiveDate,
    /// Working days from project start to the latest earliest finish.
    pub total_duration: i64,
    /// Topological order used by both passes.
    pub order: Vec<TaskId>,
    pub per_task: BTreeMap<TaskId, TaskTiming>,
    /// Every task on the longest chain, plus any task with negative slack, in topological order.
    pub critical_task_ids: Vec<TaskId>,
    #[serde(default)]
    pub warnings: Vec<ScheduleWarning>,
}

impl CriticalPathReport {
    pub fn timing(&self, task_id: TaskId) -> Option<&TaskTiming> {
        self.per_task.get(&task_id)
    }

    pub fn is_critical(&self, task_id: TaskId) -> bool {
        self.timing(task_id).is_some_and(|t| t.is_critical)
    }

    /// Whether `edge` is binding: the successor sits exactly where the edge pushes it.
    fn is_tight(&self, edge: &DependencyEdge) -> bool {
        let (Some(pred), Some(succ)) = (
            self.timing(edge.predecessor_id),
            self.timing(edge.successor_id),
        ) else {
            return false;
        };
        match edge.dependency_type {
            DependencyType::FinishToStart => {
                succ.earliest_start_offset == pred.earliest_finish_offset + edge.lag
            }
            DependencyType::StartToStart => {
                succ.earliest_start_offset == pred.earliest_start_offset + edge.lag
            }
            DependencyType::FinishToFinish => {
                succ.earliest_finish_offset == pred.earliest_finish_offset + edge.lag
            }
            DependencyType::StartToFinish => {
                succ.earliest_finish_offset == pred.earliest_start_offset + edge.lag
            }
        }
    }

    /// Critical chains from a start task to a terminal task along binding edges.
    ///
    /// Enumeration stops after `limit` chains; highly parallel critical networks can have
    /// exponentially many.
    pub fn critical_chains(&self, graph: &DependencyGraph, limit: usize) -> Vec<Vec<TaskId>> {
        let position: HashMap<TaskId, usize> = self
            .order
            .iter()
            .enumerate()
            .map(|(i, id)| (*id, i))
            .collect();

        let next_links = |id: TaskId| -> Vec<TaskId> {
            let mut next: Vec<TaskId> = graph
                .outgoing(id)
                .into_iter()
                .filter(|e| self.is_critical(e.successor_id) && self.is_tight(e))
                .map(|e| e.successor_id)
                .collect();
            next.sort_by_key(|s| position.get(s).copied().unwrap_or(usize::MAX));
            next.dedup();
            next
        };

        let starts: Vec<TaskId> = self
            .critical_task_ids
            .iter()
            .copied()
            .filter(|id| {
                !graph
                    .incoming(*id)
                    .into_iter()
                    .any(|e| self.is_critical(e.predecessor_id) && self.is_tight(e))
            })
            .collect();

        let mut chains = Vec::new();
        for start in starts {
            let mut stack: Vec<Vec<TaskId>> = vec![vec![start]];
            while let Some(chain) = stack.pop() {
                if chains.len() >= limit {
                    return chains;
                }
                let Some(&last) = chain.last() else {
                    continue;
                };
                let next = next_links(last);
                if next.is_empty() {
                    chains.push(chain);
                    continue;
                }
                for succ in next.into_iter().rev() {
                    let mut extended = chain.clone();
                    extended.push(succ);
                    stack.push(extended);
                }
            }
        }
        chains
    }
}

pub struct CpmEngine<'a> {
    graph: &'a DependencyGraph,
    calendar: &'a WorkCalendar,
    deadline: Option<NaiveDate>,
}

impl<'a> CpmEngine<'a> {
    pub fn new(graph: &'a DependencyGraph, calendar: &'a WorkCalendar) -> Self {
        Self {
            graph,
            calendar,
            deadline: None,
        }
    }

    /// Use `deadline` instead of the earliest project finish as the backward-pass anchor.
    pub fn with_deadline(mut self, deadline: Option<NaiveDate>) -> Self {
        self.deadline = deadline;
        self
    }

    pub fn execute(&self, project_start: NaiveDate) -> Result<CriticalPathReport, ScheduleError> {
        // Edges loaded from storage never went through add_edge
        self.graph.ensure_acyclic()?;
        let order = self.graph.topological_order()?;

        let early = ForwardPass::new(self.graph).execute(&order);
        let total_duration = early.values().map(|e| e.finish).max().unwrap_or(0);

        let origin = self.calendar.align_forward(project_start);
        let anchor = match self.deadline {
            Some(deadline) => self
                .calendar
                .working_day_offset(origin, deadline + Duration::days(1)),
            None => total_duration,
        };
        let late = BackwardPass::new(self.graph).execute(&order, anchor);
        // A loose deadline gives the longest chain `anchor - total_duration` days of float
        let critical_slack = (anchor - total_duration).max(0);

        let mut per_task = BTreeMap::new();
        let mut critical_task_ids = Vec::new();
        let mut warnings = Vec::new();
        for &task_id in &order {
            let (Some(e), Some(l)) = (early.get(&task_id), late.get(&task_id)) else {
                continue;
            };
            let duration = e.finish - e.start;
            let slack = l.start - e.start;
            let is_critical = slack <= critical_slack;
            if slack < 0 {
                warn!(task = %task_id, slack, "negative slack: schedule cannot meet its anchor");
                warnings.push(ScheduleWarning::NegativeSlack { task_id, slack });
            }
            if is_critical {
                critical_task_ids.push(task_id);
            }

            per_task.insert(
                task_id,
                TaskTiming {
                    task_id,
                    duration,
                    earliest_start_offset: e.start,
                    earliest_finish_offset: e.finish,
                    latest_start_offset: l.start,
                    latest_finish_offset: l.finish,
                    earliest_start: self.start_date(origin, e.start),
                    earliest_finish: self.finish_date(origin, e.start, e.finish),
                    latest_start: self.start_date(origin, l.start),
                    latest_finish: self.finish_date(origin, l.start, l.finish),
                    slack,
                    is_critical,
                },
            );
        }

        debug!(
            tasks = order.len(),
            critical = critical_task_ids.len(),
            total_duration,
            "critical path computed"
        );

        Ok(CriticalPathReport {
            project_start: origin,
            project_finish: self.finish_date(origin, 0, total_duration),
            total_duration,
            order,
            per_task,
            critical_task_ids,
            warnings,
        })
    }

    fn start_date(&self, origin: NaiveDate, start: i64) -> NaiveDate {
        self.calendar.add_working_days(origin, start)
    }

    fn finish_date(&self, origin: NaiveDate, start: i64, finish: i64) -> NaiveDate {
        if finish > start {
            self.calendar.add_working_days(origin, finish - 1)
        } else {
            self.start_date(origin, start)
        }
    }
}
