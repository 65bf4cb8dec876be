//! Task orchestration: durable job queue, dispatcher, and cancellation
//!
//! Submitted crawl jobs and scheduler-injected refresh jobs live as rows in
//! the `tasks` table and flow through a single-consumer FIFO. Exactly one
//! job runs at a time; each job fans out internally across its own worker
//! pool. Cancellation is cooperative and cuts across the dispatcher, the
//! crawl pool, and the refresh subprocess.

mod orchestrator;
mod registry;

pub use orchestrator::{Orchestrator, OrchestratorHandle};
pub use registry::CancellationRegistry;

/// What a task does, dispatched exhaustively by the orchestrator
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TaskKind {
    /// Crawl from a seed URL under depth and domain constraints
    Crawl {
        url: String,
        depth: u32,
        same_domain: bool,
        stealth_mode: bool,
    },
    /// Re-fetch pages whose last successful fetch is stale
    StaleRefresh,
}

impl TaskKind {
    /// The `task_type` column value for this kind
    pub fn type_str(&self) -> &'static str {
        match self {
            Self::Crawl { .. } => "crawl",
            Self::StaleRefresh => "stale_refresh",
        }
    }
}

/// Lifecycle of a task row
///
/// Transitions are monotonic along `pending -> running -> terminal`;
/// cancellation may fire from `pending` or `running` and always resolves to
/// `Canceled`, never `Completed` or `Failed`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TaskStatus {
    Pending,
    Running,
    Completed,
    Canceled,
    Failed(String),
}

impl TaskStatus {
    /// Returns true for states no transition leaves
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Canceled | Self::Failed(_))
    }

    pub fn to_db_string(&self) -> String {
        match self {
            Self::Pending => "pending".to_string(),
            Self::Running => "running".to_string(),
            Self::Completed => "completed".to_string(),
            Self::Canceled => "canceled".to_string(),
            Self::Failed(reason) => format!("failed: {}", reason),
        }
    }

    pub fn from_db_string(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(Self::Pending),
            "running" => Some(Self::Running),
            "completed" => Some(Self::Completed),
            "canceled" => Some(Self::Canceled),
            "failed" => Some(Self::Failed(String::new())),
            _ => s
                .strip_prefix("failed: ")
                .map(|reason| Self::Failed(reason.to_string())),
        }
    }
}
