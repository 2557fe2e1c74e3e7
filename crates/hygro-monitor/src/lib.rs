pub mod monitor;
pub mod policy;
pub mod source;

pub use monitor::{AlertTemplate, MonitorReport, StalenessMonitor};
pub use policy::{
    MonitorObservation, StalenessPolicy, StalenessStatus, DEFAULT_HEALTH_THRESHOLD_SECS,
    DEFAULT_SUPPRESSION_THRESHOLD_SECS,
};
pub use source::{HttpLatestRecord, HttpSourceConfig, LatestRecordSource, StaticLatestRecord};
