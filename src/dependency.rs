use crate::task::TaskId;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DependencyType {
    #[default]
    FinishToStart,
    StartToStart,
    FinishToFinish,
    StartToFinish,
}

impl DependencyType {
    pub fn as_str(&self) -> &'static str {
        match self {
            DependencyType::FinishToStart => "FINISH_TO_START",
            DependencyType::StartToStart => "START_TO_START",
            DependencyType::FinishToFinish => "FINISH_TO_FINISH",
            DependencyType::StartToFinish => "START_TO_FINISH",
        }
    }
}

impl fmt::Display for DependencyType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DependencyType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().replace('-', "_").as_str() {
            "fs" | "finish_to_start" => Ok(DependencyType::FinishToStart),
            "ss" | "start_to_start" => Ok(DependencyType::StartToStart),
            "ff" | "finish_to_finish" => Ok(DependencyType::FinishToFinish),
            "sf" | "start_to_finish" => Ok(DependencyType::StartToFinish),
            other => Err(format!("unknown dependency type '{other}'")),
        }
    }
}

/// Directed constraint `predecessor -> successor`; `lag` is in working days, negative for lead.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DependencyEdge {
    pub predecessor_id: TaskId,
    pub successor_id: TaskId,
    #[serde(default, rename = "type", alias = "dependency_type")]
    pub dependency_type: DependencyType,
    #[serde(default, rename = "lag_days", alias = "lag")]
    pub lag: i64,
}

impl DependencyEdge {
    pub fn new(
        predecessor_id: impl Into<TaskId>,
        successor_id: impl Into<TaskId>,
        dependency_type: DependencyType,
        lag: i64,
    ) -> Self {
        Self {
            predecessor_id: predecessor_id.into(),
            successor_id: successor_id.into(),
            dependency_type,
            lag,
        }
    }

    pub fn finish_to_start(predecessor_id: impl Into<TaskId>, successor_id: impl Into<TaskId>) -> Self {
        Self::new(predecessor_id, successor_id, DependencyType::FinishToStart, 0)
    }
}

impl fmt::Display for DependencyEdge {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} -> {} ({}, lag {})",
            self.predecessor_id, self.successor_id, self.dependency_type, self.lag
        )
    }
}
