//! Worker events
//!
//! Everything a background worker reports travels over one channel as a
//! [`WorkerEvent`]. The receiving side owns all presentation.

use crate::core::discovery::DiscoveryResult;
use crate::core::executor::RunReport;
use crate::core::progress::ProgressUpdate;

/// Which kind of work a worker is doing
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkKind {
    Discovery,
    Run,
}

impl WorkKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            WorkKind::Discovery => "discovery",
            WorkKind::Run => "run",
        }
    }
}

/// Events emitted by the discovery and run workers
#[derive(Debug, Clone)]
pub enum WorkerEvent {
    /// One unit of a run finished
    Progress(ProgressUpdate),

    /// Human-readable run message
    Message(String),

    /// One (file, type) pair of a discovery pass finished
    DiscoveryProgress(ProgressUpdate),

    /// Discovery completed, or stopped early with `cancelled` set
    DiscoveryFinished(DiscoveryResult),

    /// A run completed
    RunFinished(RunReport),

    /// A run stopped on request; files already written stay on disk
    Cancelled(RunReport),

    /// A run or discovery aborted
    Failed {
        kind: WorkKind,
        /// The selection or configuration was at fault, not the data
        configuration: bool,
        message: String,
    },
}

impl WorkerEvent {
    /// True for the last event a worker sends
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            WorkerEvent::DiscoveryFinished(_)
                | WorkerEvent::RunFinished(_)
                | WorkerEvent::Cancelled(_)
                | WorkerEvent::Failed { .. }
        )
    }

    /// Short description for logs
    pub fn describe(&self) -> String {
        match self {
            WorkerEvent::Progress(u) => format!(
                "{}/{} {} {} {}",
                u.done, u.total, u.element_type, u.id, u.param
            ),
            WorkerEvent::Message(m) => m.clone(),
            WorkerEvent::DiscoveryProgress(u) => {
                format!("{}/{} {} in {}", u.done, u.total, u.element_type, u.file)
            }
            WorkerEvent::DiscoveryFinished(result) => format!(
                "Discovery {}: {} ids",
                if result.cancelled { "cancelled" } else { "finished" },
                result.ids_by_type.values().map(|s| s.len()).sum::<usize>()
            ),
            WorkerEvent::RunFinished(report) => format!("Run finished: {}", report),
            WorkerEvent::Cancelled(report) => format!("Run cancelled: {}", report),
            WorkerEvent::Failed { kind, message, .. } => {
                format!("{} failed: {}", kind.as_str(), message)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::selection::ElementType;

    #[test]
    fn test_terminal_events() {
        let update = ProgressUpdate {
            done: 1,
            total: 2,
            file: "a.json".to_string(),
            element_type: ElementType::Link,
            id: "C1".to_string(),
            param: "Flow_rate".to_string(),
        };
        assert!(!WorkerEvent::Progress(update.clone()).is_terminal());
        assert!(!WorkerEvent::DiscoveryProgress(update).is_terminal());
        assert!(!WorkerEvent::Message("x".to_string()).is_terminal());
        assert!(WorkerEvent::RunFinished(RunReport::default()).is_terminal());
        assert!(WorkerEvent::Cancelled(RunReport::default()).is_terminal());
        assert!(WorkerEvent::DiscoveryFinished(DiscoveryResult::default()).is_terminal());
        assert!(WorkerEvent::Failed {
            kind: WorkKind::Run,
            configuration: true,
            message: "bad".to_string(),
        }
        .is_terminal());
    }

    #[test]
    fn test_describe() {
        let event = WorkerEvent::Failed {
            kind: WorkKind::Discovery,
            configuration: false,
            message: "boom".to_string(),
        };
        assert_eq!(event.describe(), "discovery failed: boom");
    }
}
