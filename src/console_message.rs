use std::fmt::{Display, Formatter};
use crate::model::{TaskId, TaskState};

/// Something the operator should see while a sample goes through the sandbox.
#[derive(Eq, PartialEq, Clone, Debug)]
pub enum ConsoleMessage {
    /// Analyses of the same sample already exist.
    ExistingAnalyses(Vec<String>),
    Submitted(Vec<TaskId>),
    Transition { task: TaskId, state: TaskState },
    Reported { task: TaskId, url: String },
}

impl Display for ConsoleMessage {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::ExistingAnalyses(urls) => {
                f.write_str("The following analysis reports already exist for this sample:")?;
                for url in urls {
                    write!(f, "\n{url}")?;
                }
                Ok(())
            }
            Self::Submitted(tasks) => {
                let ids = tasks.iter().map(ToString::to_string).collect::<Vec<_>>().join(", ");
                write!(f, "Submitted as task(s) {ids}")
            }
            Self::Transition { task, state } => write!(f, "Task {task} is {state}"),
            Self::Reported { url, .. } => f.write_str(url),
        }
    }
}

pub fn print_console_message(console_message: ConsoleMessage) {
    println!("{console_message}");
}
