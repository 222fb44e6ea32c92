use std::cell::{Cell, RefCell};
use std::collections::{HashMap, VecDeque};

use crate::client::SandboxApi;
use crate::error::Result;
use crate::model::{TaskId, TaskState};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Submission {
    File { name: String, bytes: Vec<u8>, tags: Option<String>, options: Option<String> },
    Url { url: String, tags: Option<String>, options: Option<String> },
    HashLookup { hash: String, tags: Option<String>, options: Option<String> },
}

/// In-memory sandbox. Tasks without a scripted history are immediately `reported`.
#[derive(Default)]
pub struct FakeSandbox {
    existing: Vec<TaskId>,
    statuses: RefCell<HashMap<TaskId, VecDeque<TaskState>>>,
    submissions: RefCell<Vec<Submission>>,
    searches: RefCell<Vec<String>>,
    status_calls: Cell<usize>,
}

impl FakeSandbox {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_existing(mut self, task_ids: &[u64]) -> Self {
        self.existing = task_ids.iter().copied().map(TaskId::from).collect();
        self
    }

    pub fn script(&self, task_id: u64, states: &[&str]) {
        self.statuses.borrow_mut().insert(TaskId::from(task_id), states.iter().map(|s| TaskState::from_wire(s)).collect());
    }

    pub fn submissions(&self) -> Vec<Submission> {
        self.submissions.borrow().clone()
    }

    pub fn searches(&self) -> Vec<String> {
        self.searches.borrow().clone()
    }

    pub fn status_calls(&self) -> usize {
        self.status_calls.get()
    }

    fn record(&self, submission: Submission) -> Vec<TaskId> {
        self.submissions.borrow_mut().push(submission);
        vec![TaskId::from(100 + self.submissions.borrow().len() as u64)]
    }
}

fn owned(value: Option<&str>) -> Option<String> {
    value.map(str::to_owned)
}

impl SandboxApi for FakeSandbox {
    fn root(&self) -> &str {
        "http://sandbox.test"
    }

    fn find_tasks_by_hash(&self, hash: &str) -> Result<Vec<TaskId>> {
        crate::hash::classify(hash)?;
        self.searches.borrow_mut().push(hash.to_owned());
        Ok(self.existing.clone())
    }

    fn submit_file(&self, name: &str, bytes: Vec<u8>, tags: Option<&str>, options: Option<&str>) -> Result<Vec<TaskId>> {
        Ok(self.record(Submission::File { name: name.to_owned(), bytes, tags: owned(tags), options: owned(options) }))
    }

    fn submit_url(&self, url: &str, tags: Option<&str>, options: Option<&str>) -> Result<Vec<TaskId>> {
        Ok(self.record(Submission::Url { url: url.to_owned(), tags: owned(tags), options: owned(options) }))
    }

    fn submit_hash_lookup(&self, hash: &str, tags: Option<&str>, options: Option<&str>) -> Result<Vec<TaskId>> {
        Ok(self.record(Submission::HashLookup { hash: hash.to_owned(), tags: owned(tags), options: owned(options) }))
    }

    fn get_task_status(&self, task_id: &TaskId) -> Result<TaskState> {
        self.status_calls.set(self.status_calls.get() + 1);

        let mut statuses = self.statuses.borrow_mut();
        let Some(history) = statuses.get_mut(task_id) else {
            return Ok(TaskState::Reported);
        };
        // the last scripted state sticks
        Ok(if history.len() > 1 {
            history.pop_front().unwrap_or(TaskState::Reported)
        } else {
            history.front().cloned().unwrap_or(TaskState::Reported)
        })
    }
}
