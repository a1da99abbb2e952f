pub mod candidates;
pub mod trend;
