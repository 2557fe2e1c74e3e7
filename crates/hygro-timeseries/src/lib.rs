pub mod influx;
pub mod memory;
pub mod store;

pub use influx::{to_line_protocol, InfluxConfig, InfluxStore};
pub use memory::MemoryStore;
pub use store::{TimeSeriesStore, TimescaleStore};
