use krpc_common::tasks::Task;
use serde::{Deserialize, Serialize};

/// A task record as printed by `krpc tasks --json`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskSummary {
    pub name: String,
    pub pid: i32,
    pub state: u32,
    pub flags: u32,
}

impl From<&Task> for TaskSummary {
    fn from(task: &Task) -> Self {
        Self {
            name: task.name.to_string_lossy(),
            pid: task.pid,
            state: task.state,
            flags: task.flags,
        }
    }
}

/// One report line: `+ self - <name>, pid - <pid>, state - <state>, flags - <flags>`.
pub fn format_task(task: &Task) -> String {
    format!(
        "+ self - {}, pid - {}, state - {}, flags - {}",
        task.name.to_string_lossy(),
        task.pid,
        task.state,
        task.flags
    )
}

/// All tasks as a single-line JSON array.
pub fn tasks_to_json(tasks: &[Task]) -> serde_json::Result<String> {
    let summaries: Vec<TaskSummary> = tasks.iter().map(TaskSummary::from).collect();
    serde_json::to_string(&summaries)
}
