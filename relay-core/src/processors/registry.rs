use relay_sdk::objects::EventTask;
use tracing::warn;

use super::{TaskFailure, TaskHandler, TaskOutcome};

/// Processors by task name.
#[derive(Default)]
pub struct TaskRegistry {
    handlers: Vec<Box<dyn TaskHandler>>,
}

impl TaskRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `handler` under its task name, replacing any earlier handler
    /// with the same name.
    pub fn register(mut self, handler: impl TaskHandler + 'static) -> Self {
        let name = handler.task_name();
        if let Some(existing) = self.handlers.iter_mut().find(|h| h.task_name() == name) {
            warn!(task = name, "Replacing registered task handler");
            *existing = Box::new(handler);
        } else {
            self.handlers.push(Box::new(handler));
        }
        self
    }

    pub fn get(&self, name: &str) -> Option<&dyn TaskHandler> {
        self.handlers
            .iter()
            .find(|h| h.task_name() == name)
            .map(|h| h.as_ref())
    }

    pub fn task_names(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.handlers.iter().map(|h| h.task_name())
    }

    /// Run `task` through its registered processor.
    pub async fn dispatch(&self, task: &EventTask) -> TaskOutcome {
        match self.get(&task.name) {
            Some(handler) => handler.handle(task).await,
            None => TaskOutcome::Failed(TaskFailure::UnknownTask(task.name.clone())),
        }
    }
}
