use schedule_engine::{
    CycleCheck, CycleError, DependencyEdge, DependencyGraph, DependencyType, EdgeError, ProjectId,
    TaskId, TaskNode, TaskRecord, WorkCalendar, engine,
};

fn graph_of(ids: &[i64]) -> DependencyGraph {
    let mut g = DependencyGraph::new();
    for &id in ids {
        g.add_task(TaskNode::new(id, 1, 1)).unwrap();
    }
    g
}

fn ids(raw: &[i64]) -> Vec<TaskId> {
    raw.iter().copied().map(TaskId).collect()
}

#[test]
fn reverse_edge_reports_cycle_and_leaves_graph_unchanged() {
    let mut g = graph_of(&[1, 2]);
    g.add_edge(DependencyEdge::finish_to_start(1, 2)).unwrap();

    let err = g.add_edge(DependencyEdge::finish_to_start(2, 1)).unwrap_err();
    assert_eq!(err, EdgeError::CycleDetected(CycleError { path: ids(&[1, 2]) }));
    assert_eq!(g.edge_count(), 1);
    assert!(g.validate().is_acyclic());
}

#[test]
fn transitive_cycle_path_starts_at_the_new_successor() {
    let mut g = graph_of(&[1, 2, 3]);
    g.add_edge(DependencyEdge::finish_to_start(1, 2)).unwrap();
    g.add_edge(DependencyEdge::new(2, 3, DependencyType::StartToStart, 2))
        .unwrap();

    let err = g.add_edge(DependencyEdge::finish_to_start(3, 1)).unwrap_err();
    assert_eq!(
        err,
        EdgeError::CycleDetected(CycleError {
            path: ids(&[1, 2, 3])
        })
    );
    assert_eq!(g.edge_count(), 2);
}

#[test]
fn batch_stops_at_first_offending_edge() {
    let mut g = graph_of(&[1, 2, 3, 4]);
    let batch = vec![
        DependencyEdge::finish_to_start(1, 2),
        DependencyEdge::finish_to_start(2, 3),
        DependencyEdge::finish_to_start(3, 1),
        DependencyEdge::finish_to_start(3, 4),
    ];
    let err = g.add_edges(batch).unwrap_err();
    assert!(matches!(err, EdgeError::CycleDetected(_)));
    // the two edges before the offending one stay committed
    assert_eq!(g.edge_count(), 2);
    assert!(g.outgoing(TaskId(3)).is_empty());
}

#[test]
fn self_dependency_is_rejected() {
    let mut g = graph_of(&[1]);
    assert_eq!(
        g.add_edge(DependencyEdge::finish_to_start(1, 1)),
        Err(EdgeError::SelfDependency { task: TaskId(1) })
    );
}

#[test]
fn cross_project_edge_is_rejected() {
    let mut g = DependencyGraph::new();
    g.add_task(TaskNode::new(1, 10, 1)).unwrap();
    g.add_task(TaskNode::new(2, 20, 1)).unwrap();
    assert_eq!(
        g.add_edge(DependencyEdge::finish_to_start(1, 2)),
        Err(EdgeError::CrossProject {
            predecessor: TaskId(1),
            predecessor_project: ProjectId(10),
            successor: TaskId(2),
            successor_project: ProjectId(20),
        })
    );
}

#[test]
fn parent_child_edges_are_rejected_both_ways() {
    let mut g = DependencyGraph::new();
    g.add_task(TaskNode::new(1, 1, 5)).unwrap();
    let mut child = TaskNode::new(2, 1, 2);
    child.parent_id = Some(TaskId(1));
    g.add_task(child).unwrap();

    let conflict = EdgeError::HierarchyConflict {
        parent: TaskId(1),
        child: TaskId(2),
    };
    assert_eq!(
        g.add_edge(DependencyEdge::finish_to_start(1, 2)),
        Err(conflict.clone())
    );
    assert_eq!(g.add_edge(DependencyEdge::finish_to_start(2, 1)), Err(conflict));
    assert_eq!(g.edge_count(), 0);
}

#[test]
fn unknown_endpoint_is_rejected() {
    let mut g = graph_of(&[1]);
    assert_eq!(
        g.add_edge(DependencyEdge::finish_to_start(1, 5)),
        Err(EdgeError::UnknownTask { task: TaskId(5) })
    );
}

#[test]
fn stored_cycle_path_edges_exist_in_input() {
    let cases: Vec<Vec<(i64, i64)>> = vec![
        vec![(1, 2), (2, 3), (3, 1)],
        vec![(1, 2), (2, 3), (3, 4), (4, 5), (5, 3), (1, 5)],
        vec![(5, 4), (4, 3), (3, 2), (2, 1), (1, 4)],
        vec![(1, 2), (1, 3), (3, 6), (6, 7), (7, 3), (2, 6)],
    ];
    for edges in cases {
        let max = edges.iter().map(|&(a, b)| a.max(b)).max().unwrap();
        let tasks: Vec<TaskRecord> = (1..=max).map(|id| TaskRecord::new(id, 1, "")).collect();
        let deps: Vec<DependencyEdge> = edges
            .iter()
            .map(|&(p, s)| DependencyEdge::finish_to_start(p, s))
            .collect();
        let g = DependencyGraph::from_snapshot(&tasks, &deps, &WorkCalendar::default()).unwrap();

        let CycleCheck::CycleFound(path) = g.validate() else {
            panic!("expected a cycle in {edges:?}");
        };
        assert!(!path.is_empty());
        for (i, from) in path.iter().enumerate() {
            let to = path[(i + 1) % path.len()];
            assert!(
                edges.contains(&(from.0, to.0)),
                "edge {from} -> {to} of {path:?} is not in {edges:?}"
            );
        }
    }
}

#[test]
fn acyclic_inputs_validate() {
    let tasks: Vec<TaskRecord> = (1..=6).map(|id| TaskRecord::new(id, 1, "")).collect();
    let edges = vec![
        DependencyEdge::finish_to_start(1, 2),
        DependencyEdge::finish_to_start(1, 3),
        DependencyEdge::new(2, 4, DependencyType::FinishToFinish, 1),
        DependencyEdge::new(3, 4, DependencyType::StartToFinish, -1),
        DependencyEdge::finish_to_start(4, 5),
        DependencyEdge::finish_to_start(1, 5),
    ];
    let acyclic = engine::validate_graph(&tasks, &edges).unwrap();
    assert_eq!(acyclic.task_count, 6);
    assert_eq!(acyclic.edge_count, 6);
}

#[test]
fn topological_order_respects_every_edge() {
    let tasks: Vec<TaskRecord> = (1..=5)
        .map(|id| TaskRecord::new(id, 1, "").with_display_order(10 - id))
        .collect();
    let edges = vec![
        DependencyEdge::finish_to_start(1, 4),
        DependencyEdge::finish_to_start(2, 4),
        DependencyEdge::finish_to_start(4, 5),
        DependencyEdge::finish_to_start(3, 5),
    ];
    let g = DependencyGraph::from_snapshot(&tasks, &edges, &WorkCalendar::default()).unwrap();
    let order = g.topological_order().unwrap();
    let position = |id: i64| order.iter().position(|t| *t == TaskId(id)).unwrap();
    for edge in &edges {
        assert!(position(edge.predecessor_id.0) < position(edge.successor_id.0));
    }
    // 3 has the lowest display order among the initially ready tasks
    assert_eq!(order[0], TaskId(3));
}
