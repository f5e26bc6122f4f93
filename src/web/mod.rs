//! HTTP API: sync triggers, job metadata, scheduler control and status.

pub mod error;
pub mod jobs;
pub mod routes;
pub mod status;

pub use routes::*;
