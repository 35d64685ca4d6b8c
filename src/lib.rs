//! Library crate for scanip exposing the scan engine and its collaborators.
pub mod config;
pub mod logging;
pub mod probe;
pub mod scanner;
pub mod sink;
pub mod targets;
pub mod types;
