use schedule_engine::hierarchy::{aggregate_progress, ProgressTree};
use schedule_engine::{
    HierarchyError, ProjectMetadata, ProjectSnapshot, ProgressUpdate, TaskId, TaskRecord,
};

fn task(id: i64, parent: Option<i64>, progress: u8) -> TaskRecord {
    let mut record = TaskRecord::new(id, 1, format!("T{id}")).with_progress(progress);
    record.parent_id = parent.map(TaskId);
    record
}

#[test]
fn parent_takes_mean_of_direct_children() {
    let parent = task(1, None, 0);
    let children = [task(2, Some(1), 40), task(3, Some(1), 60)];
    assert_eq!(aggregate_progress(&parent, &children), 50);
}

#[test]
fn halves_round_up() {
    let parent = task(1, None, 0);
    let children = [task(2, Some(1), 33), task(3, Some(1), 34)];
    assert_eq!(aggregate_progress(&parent, &children), 34);
    let children = [task(2, Some(1), 0), task(3, Some(1), 0), task(4, Some(1), 1)];
    assert_eq!(aggregate_progress(&parent, &children), 0);
}

#[test]
fn leaf_keeps_stored_progress() {
    assert_eq!(aggregate_progress(&task(9, None, 70), &[]), 70);
}

#[test]
fn nested_children_aggregate_from_their_own_children() {
    // 1 -> {2, 3}; 3 -> {4, 5}
    let tasks = vec![
        task(1, None, 0),
        task(2, Some(1), 50),
        task(3, Some(1), 0),
        task(4, Some(3), 0),
        task(5, Some(3), 100),
    ];
    let tree = ProgressTree::from_tasks(&tasks).unwrap();
    assert_eq!(tree.aggregate(TaskId(3)).unwrap(), 50);
    assert_eq!(tree.aggregate(TaskId(1)).unwrap(), 50);
    // aggregate never writes
    assert_eq!(tree.progress(TaskId(3)), Some(0));
}

#[test]
fn rollup_reports_only_changed_parents() {
    let tasks = vec![
        task(1, None, 0),
        task(2, Some(1), 20),
        task(3, Some(1), 0),
        task(4, Some(3), 10),
        task(5, Some(3), 30),
        task(6, None, 100),
    ];
    let mut tree = ProgressTree::from_tasks(&tasks).unwrap();
    let updates = tree.rollup();
    assert_eq!(
        updates,
        vec![
            ProgressUpdate {
                task_id: TaskId(3),
                old: 0,
                new: 20
            },
            ProgressUpdate {
                task_id: TaskId(1),
                old: 0,
                new: 20
            },
        ]
    );
    assert!(tree.rollup().is_empty());
}

#[test]
fn setting_a_leaf_propagates_to_the_root() {
    let mut project = ProjectSnapshot::new(ProjectMetadata::new(1, "Rollout"));
    for record in [
        task(1, None, 0),
        task(2, Some(1), 0),
        task(3, Some(1), 0),
        task(4, Some(3), 0),
        task(5, Some(3), 0),
    ] {
        project.add_task(record).unwrap();
    }

    let updates = project.set_progress(TaskId(4), 100).unwrap();
    let changed: Vec<(TaskId, u8)> = updates.iter().map(|u| (u.task_id, u.new)).collect();
    assert_eq!(changed, vec![(TaskId(4), 100), (TaskId(3), 50), (TaskId(1), 25)]);
    assert_eq!(project.task(TaskId(1)).unwrap().progress_percentage, 25);
    assert_eq!(project.task(TaskId(3)).unwrap().progress_percentage, 50);
}

#[test]
fn summary_progress_cannot_be_set_directly() {
    let tasks = vec![task(1, None, 0), task(2, Some(1), 0)];
    let mut tree = ProgressTree::from_tasks(&tasks).unwrap();
    assert_eq!(
        tree.set_leaf_progress(TaskId(1), 80),
        Err(HierarchyError::NotALeaf(TaskId(1)))
    );
    assert_eq!(
        tree.set_leaf_progress(TaskId(2), 101),
        Err(HierarchyError::ProgressOutOfRange {
            task: TaskId(2),
            value: 101
        })
    );
    assert_eq!(
        tree.set_leaf_progress(TaskId(7), 10),
        Err(HierarchyError::UnknownTask(TaskId(7)))
    );
}

#[test]
fn broken_parent_links_are_rejected() {
    let looped = vec![task(1, Some(2), 0), task(2, Some(1), 0)];
    assert!(matches!(
        ProgressTree::from_tasks(&looped),
        Err(HierarchyError::ParentCycle { .. })
    ));

    let orphan = vec![task(1, Some(9), 0)];
    assert_eq!(
        ProgressTree::from_tasks(&orphan).unwrap_err(),
        HierarchyError::UnknownParent {
            task: TaskId(1),
            parent: TaskId(9)
        }
    );
}
