//! Headless machine agent.
//!
//! Runs on a factory machine: registers it with the server, keeps it marked
//! online, ships its log files, executes queued commands, backs up files to
//! FTP and watches values for changes.

pub mod backup;
pub mod client;
pub mod log_collector;
pub mod machine_info;
pub mod monitor;
pub mod runner;

pub use client::ApiClient;
pub use machine_info::MachineInfo;
pub use runner::Agent;
