pub mod config;
pub mod daemon;
pub mod error;
pub mod ipc;
pub mod poller;
pub mod settings;
pub mod worker;

#[cfg(test)]
mod testing;

pub use config::DaemonConfig;
pub use daemon::Daemon;
pub use error::PollError;
pub use poller::{CycleReport, Poller, PreviewItem};
pub use settings::Credentials;
pub use worker::{CycleStatus, Enqueued, PollQueue, PollWorker, TriggerSource};
