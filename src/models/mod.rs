pub mod detail;
pub mod snapshot;
pub mod trend;
