pub mod cleaning;
pub mod config;
pub mod dataset;
pub mod error;
pub mod job;
pub mod object_store;
pub mod tracking;
