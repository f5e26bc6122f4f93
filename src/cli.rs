use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

use crate::data::models::Category;

/// OLT device synchronization service
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Args {
    /// Log formatter to use
    #[arg(long, value_enum, default_value_t = default_tracing_format())]
    pub tracing: TracingFormat,

    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Run the HTTP API, job workers and scheduler (default)
    Serve,
    /// Run a parser over a captured device transcript and print the result as JSON
    Parse {
        #[arg(value_enum)]
        category: Category,
        file: PathBuf,
        /// Slot the transcript was captured for (port occupancy only)
        #[arg(long, default_value_t = 1)]
        slot: u8,
        /// PON port the transcript was captured for (port occupancy only)
        #[arg(long, default_value_t = 1)]
        port: u8,
    },
}

#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
pub enum TracingFormat {
    /// Human-readable output with colors
    Pretty,
    /// One JSON object per line
    Json,
}

fn default_tracing_format() -> TracingFormat {
    if cfg!(debug_assertions) {
        TracingFormat::Pretty
    } else {
        TracingFormat::Json
    }
}

/// Long-running services registered with the service manager.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServiceName {
    Web,
    Sync,
}

impl ServiceName {
    pub fn all() -> Vec<ServiceName> {
        vec![ServiceName::Web, ServiceName::Sync]
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ServiceName::Web => "web",
            ServiceName::Sync => "sync",
        }
    }
}
