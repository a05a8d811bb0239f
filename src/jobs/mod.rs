//! Background jobs that write progress to a notification row

pub mod deletion;

pub use deletion::{ClusterDeletionJob, DeletionError, DeletionProgress, DeletionReport};
