use serde::{Deserialize, Serialize};

/// A unit of work produced by a chain log watcher.
///
/// `log` is the JSON text of the observed chain log, kept opaque so that a
/// malformed log is detected by the processor that owns it rather than
/// rejected as an unreadable task.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventTask {
    /// Registered task name, e.g. `sendTopUpFeeToHeimdall`.
    pub name: String,
    /// Contract event name, e.g. `TopUpFee`.
    pub event_name: String,
    pub log: String,
}

impl EventTask {
    pub fn new(
        name: impl Into<String>,
        event_name: impl Into<String>,
        log: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            event_name: event_name.into(),
            log: log.into(),
        }
    }
}
