pub mod checkpoint;
pub mod extractor;
pub mod git;
pub mod replicator;

pub use checkpoint::FileCheckpointStore;
pub use extractor::RecordExtractor;
pub use git::{GitCommitLog, GitLogConfig};
pub use replicator::{ReplicationReport, Replicator};
