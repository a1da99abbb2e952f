pub mod cycle;
pub mod db;
pub mod settings;
pub mod sources;
