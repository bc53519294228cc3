mod change_log;
mod error;
mod manager;
mod snapshot;
mod task_serializer;

pub use change_log::{compact, ChangeOp, ChangeSet, RawChange};
pub use error::SyncError;
pub use manager::{backoff_delay, PullResult, SyncContext, SyncEndpoints, SyncManager};
pub use snapshot::{diff, replay, Reconciliation};
pub use task_serializer::TaskSerializer;
