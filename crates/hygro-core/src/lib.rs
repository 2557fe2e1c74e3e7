pub mod checkpoint;
pub mod error;
pub mod log;
pub mod model;
pub mod snapshot;

pub use checkpoint::{CheckpointStore, MemoryCheckpointStore};
pub use error::{HygroError, Result};
pub use log::{CommitLog, MemoryCommitLog};
pub use model::{Checkpoint, Record, Revision, RevisionId};
pub use snapshot::{parse_timestamp, parse_timestamp_str, RecordSchema};
