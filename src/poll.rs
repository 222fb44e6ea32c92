use std::thread;
use std::time::Duration;
use indexmap::IndexMap;

use crate::client::SandboxApi;
use crate::console_message::ConsoleMessage;
use crate::error::Result;
use crate::model::{TaskId, TaskState};

#[derive(Default, Debug, Clone)]
pub struct TrackedTask {
    pub previous: Option<TaskState>,
    pub current: Option<TaskState>,
}

pub struct Observation {
    pub state: TaskState,
    pub changed: bool,
    pub removed: bool,
}

/// Tasks still waiting for a terminal state, in submission order.
#[derive(Default)]
pub struct TaskTracker {
    tasks: IndexMap<TaskId, TrackedTask>,
}

impl TaskTracker {
    pub fn new(task_ids: impl IntoIterator<Item = TaskId>) -> Self {
        Self {
            tasks: task_ids.into_iter().map(|id| (id, TrackedTask::default())).collect(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    pub fn task_ids(&self) -> Vec<TaskId> {
        self.tasks.keys().cloned().collect()
    }

    pub fn get(&self, task_id: &TaskId) -> Option<&TrackedTask> {
        self.tasks.get(task_id)
    }

    /// Records a freshly fetched state. The task stops being tracked once the state is terminal.
    pub fn observe(&mut self, task_id: &TaskId, state: TaskState) -> Observation {
        let tracked = self.tasks.entry(task_id.clone()).or_default();
        tracked.previous = tracked.current.replace(state.clone());
        let changed = tracked.previous.as_ref() != Some(&state);

        let removed = state.is_terminal();
        if removed {
            self.tasks.shift_remove(task_id);
        }

        Observation { state, changed, removed }
    }
}

/// Polls every task until all of them are reported or failed. There is no timeout.
pub fn poll_until_done<A: SandboxApi + ?Sized>(
    api: &A,
    task_ids: Vec<TaskId>,
    interval: Duration,
    sink: &mut dyn FnMut(ConsoleMessage),
) -> Result<()> {
    let mut tracker = TaskTracker::new(task_ids);

    while !tracker.is_empty() {
        for task_id in tracker.task_ids() {
            let observation = tracker.observe(&task_id, api.get_task_status(&task_id)?);

            if observation.changed {
                sink(ConsoleMessage::Transition { task: task_id.clone(), state: observation.state.clone() });
            }
            if observation.state == TaskState::Reported {
                sink(ConsoleMessage::Reported { url: api.analysis_url(&task_id), task: task_id.clone() });
            }
            if observation.removed {
                tracing::debug!(%task_id, state = %observation.state, remaining = tracker.len(), "task finished");
            }

            thread::sleep(interval);
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::FakeSandbox;

    fn run(api: &FakeSandbox, task_ids: Vec<TaskId>) -> Vec<ConsoleMessage> {
        let mut messages = Vec::new();
        poll_until_done(api, task_ids, Duration::ZERO, &mut |message| messages.push(message)).unwrap();
        messages
    }

    #[test]
    fn one_notice_per_change_and_one_link() {
        let api = FakeSandbox::new();
        api.script(1, &["pending", "pending", "running", "running", "completed", "reported"]);

        let messages = run(&api, vec![TaskId::from(1)]);

        let states: Vec<_> = messages.iter().filter_map(|m| match m {
            ConsoleMessage::Transition { state, .. } => Some(state.as_str().to_owned()),
            _ => None,
        }).collect();
        assert_eq!(states, ["pending", "running", "processing", "reported"]);

        let links: Vec<_> = messages.iter().filter(|m| matches!(m, ConsoleMessage::Reported { .. })).collect();
        assert_eq!(links, [&ConsoleMessage::Reported { task: TaskId::from(1), url: "http://sandbox.test/analysis/1".to_owned() }]);
        assert_eq!(messages.last(), links.last().copied());
        assert_eq!(api.status_calls(), 6);
    }

    #[test]
    fn failed_tasks_stop_without_a_link() {
        let api = FakeSandbox::new();
        api.script(1, &["running", "failed_analysis"]);
        api.script(2, &["pending", "running", "reported"]);

        let messages = run(&api, vec![TaskId::from(1), TaskId::from(2)]);

        assert!(messages.contains(&ConsoleMessage::Transition {
            task: TaskId::from(1),
            state: TaskState::Failed("failed_analysis".to_owned()),
        }));
        let links: Vec<_> = messages.iter().filter_map(|m| match m {
            ConsoleMessage::Reported { task, .. } => Some(task.clone()),
            _ => None,
        }).collect();
        assert_eq!(links, [TaskId::from(2)]);
        assert_eq!(api.status_calls(), 5);
    }

    #[test]
    fn nothing_to_poll_returns_immediately() {
        let api = FakeSandbox::new();
        assert!(run(&api, Vec::new()).is_empty());
        assert_eq!(api.status_calls(), 0);
    }

    #[test]
    fn tracker_removes_only_on_terminal_states() {
        let mut tracker = TaskTracker::new([TaskId::from(1), TaskId::from(2)]);

        let first = tracker.observe(&TaskId::from(1), TaskState::Pending);
        assert!(first.changed && !first.removed);
        let again = tracker.observe(&TaskId::from(1), TaskState::Pending);
        assert!(!again.changed && !again.removed);
        assert_eq!(tracker.get(&TaskId::from(1)).unwrap().previous, Some(TaskState::Pending));

        tracker.observe(&TaskId::from(1), TaskState::Other("distributed".to_owned()));
        assert_eq!(tracker.len(), 2);

        assert!(tracker.observe(&TaskId::from(1), TaskState::Reported).removed);
        assert!(tracker.observe(&TaskId::from(2), TaskState::Failed("failed_processing".to_owned())).removed);
        assert!(tracker.is_empty());
    }
}
