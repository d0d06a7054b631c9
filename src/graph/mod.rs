//! Dependency graph for one scheduling run.
//!
//! Nodes are [`TaskNode`]s and edges are typed, lagged [`DependencyEdge`]s held in a
//! `petgraph` digraph. Edges inserted through [`DependencyGraph::add_edge`] are checked one
//! at a time; edges loaded with [`DependencyGraph::from_snapshot`] only have their endpoints
//! checked, and such graphs go through [`DependencyGraph::validate`] before any CPM pass.

pub mod cycle;
pub mod topo;

use crate::calendar::WorkCalendar;
use crate::dependency::DependencyEdge;
use crate::error::{CycleError, EdgeError, ScheduleError};
use crate::task::{TaskId, TaskNode, TaskRecord};
use crate::task_validation::{self, TaskValidationError};
use petgraph::Direction;
use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::visit::EdgeRef;
use std::collections::HashMap;
use tracing::{debug, warn};

pub use cycle::CycleCheck;

#[derive(Debug, Clone, Default)]
pub struct DependencyGraph {
    graph: DiGraph<TaskNode, DependencyEdge>,
    id_to_index: HashMap<TaskId, NodeIndex>,
}

impl DependencyGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a graph from persisted tasks and edges without per-edge structural checks.
    pub fn from_snapshot(
        tasks: &[TaskRecord],
        edges: &[DependencyEdge],
        calendar: &WorkCalendar,
    ) -> Result<Self, ScheduleError> {
        task_validation::validate_task_collection(tasks)?;

        let mut dag = Self::new();
        for record in tasks {
            dag.add_task(TaskNode::from_record(record, calendar))?;
        }
        for edge in edges {
            let (Some(&u), Some(&v)) = (
                dag.id_to_index.get(&edge.predecessor_id),
                dag.id_to_index.get(&edge.successor_id),
            ) else {
                let missing = if dag.contains(edge.predecessor_id) {
                    edge.successor_id
                } else {
                    edge.predecessor_id
                };
                return Err(EdgeError::UnknownTask { task: missing }.into());
            };
            dag.graph.add_edge(u, v, edge.clone());
        }
        debug!(
            tasks = dag.node_count(),
            edges = dag.edge_count(),
            "dependency graph loaded from snapshot"
        );
        Ok(dag)
    }

    pub fn add_task(&mut self, node: TaskNode) -> Result<(), ScheduleError> {
        if self.id_to_index.contains_key(&node.id) {
            return Err(TaskValidationError::DuplicateId(node.id).into());
        }
        let id = node.id;
        let ix = self.graph.add_node(node);
        self.id_to_index.insert(id, ix);
        Ok(())
    }

    /// Validate and commit a single edge; a rejected edge leaves the graph untouched.
    pub fn add_edge(&mut self, edge: DependencyEdge) -> Result<(), EdgeError> {
        let pred = edge.predecessor_id;
        let succ = edge.successor_id;
        if pred == succ {
            return Err(EdgeError::SelfDependency { task: pred });
        }

        let u = self.index_of(pred).ok_or(EdgeError::UnknownTask { task: pred })?;
        let v = self.index_of(succ).ok_or(EdgeError::UnknownTask { task: succ })?;
        let (pred_node, succ_node) = (&self.graph[u], &self.graph[v]);

        if pred_node.project_id != succ_node.project_id {
            return Err(EdgeError::CrossProject {
                predecessor: pred,
                predecessor_project: pred_node.project_id,
                successor: succ,
                successor_project: succ_node.project_id,
            });
        }
        if succ_node.parent_id == Some(pred) {
            return Err(EdgeError::HierarchyConflict {
                parent: pred,
                child: succ,
            });
        }
        if pred_node.parent_id == Some(succ) {
            return Err(EdgeError::HierarchyConflict {
                parent: succ,
                child: pred,
            });
        }
        if self
            .graph
            .edges_connecting(u, v)
            .any(|e| e.weight().dependency_type == edge.dependency_type)
        {
            return Err(EdgeError::DuplicateEdge {
                predecessor: pred,
                successor: succ,
                dependency_type: edge.dependency_type,
            });
        }
        // pred -> succ closes a cycle iff succ already reaches pred
        if let Some(path) = cycle::path_between(self, succ, pred) {
            warn!(%edge, ?path, "dependency rejected: it would create a cycle");
            return Err(EdgeError::CycleDetected(CycleError { path }));
        }

        self.graph.add_edge(u, v, edge);
        Ok(())
    }

    /// Commit edges in order, stopping at the first rejection; earlier edges stay committed.
    pub fn add_edges<I>(&mut self, edges: I) -> Result<usize, EdgeError>
    where
        I: IntoIterator<Item = DependencyEdge>,
    {
        let mut committed = 0;
        for edge in edges {
            self.add_edge(edge)?;
            committed += 1;
        }
        Ok(committed)
    }

    /// Whole-graph cycle check, used before CPM on graphs loaded from storage.
    pub fn validate(&self) -> CycleCheck {
        cycle::check(self)
    }

    pub fn ensure_acyclic(&self) -> Result<(), CycleError> {
        match self.validate() {
            CycleCheck::Acyclic => Ok(()),
            CycleCheck::CycleFound(path) => Err(CycleError { path }),
        }
    }

    pub fn topological_order(&self) -> Result<Vec<TaskId>, ScheduleError> {
        topo::sequence(self)
    }

    pub fn contains(&self, id: TaskId) -> bool {
        self.id_to_index.contains_key(&id)
    }

    pub fn task(&self, id: TaskId) -> Option<&TaskNode> {
        self.index_of(id).map(|ix| &self.graph[ix])
    }

    /// Tasks in ascending id order.
    pub fn tasks(&self) -> Vec<&TaskNode> {
        let mut nodes: Vec<&TaskNode> = self.graph.node_weights().collect();
        nodes.sort_by_key(|node| node.id);
        nodes
    }

    pub fn edges(&self) -> impl Iterator<Item = &DependencyEdge> {
        self.graph.edge_weights()
    }

    /// Edges ending at `id`.
    pub fn incoming(&self, id: TaskId) -> Vec<&DependencyEdge> {
        self.edges_directed(id, Direction::Incoming)
    }

    /// Edges starting at `id`.
    pub fn outgoing(&self, id: TaskId) -> Vec<&DependencyEdge> {
        self.edges_directed(id, Direction::Outgoing)
    }

    fn edges_directed(&self, id: TaskId, direction: Direction) -> Vec<&DependencyEdge> {
        match self.index_of(id) {
            Some(ix) => self
                .graph
                .edges_directed(ix, direction)
                .map(|e| e.weight())
                .collect(),
            None => Vec::new(),
        }
    }

    /// Whether `ancestor` appears on the parent chain of `task`.
    pub fn is_ancestor(&self, ancestor: TaskId, task: TaskId) -> bool {
        let mut current = self.task(task).and_then(|node| node.parent_id);
        let mut steps = 0;
        while let Some(parent) = current {
            if parent == ancestor {
                return true;
            }
            steps += 1;
            if steps > self.node_count() {
                return false;
            }
            current = self.task(parent).and_then(|node| node.parent_id);
        }
        false
    }

    pub fn node_count(&self) -> usize {
        self.graph.node_count()
    }

    pub fn edge_count(&self) -> usize {
        self.graph.edge_count()
    }

    pub fn is_empty(&self) -> bool {
        self.graph.node_count() == 0
    }

    pub(crate) fn index_of(&self, id: TaskId) -> Option<NodeIndex> {
        self.id_to_index.get(&id).copied()
    }

    pub(crate) fn inner(&self) -> &DiGraph<TaskNode, DependencyEdge> {
        &self.graph
    }
}
