//! Interactive terminal access to the OLT.
//!
//! A [`SessionFactory`] opens authenticated [`DeviceSession`]s; the [`DeviceGuard`] wraps the
//! factory so that at most one session is open against the device at any time.

pub mod error;
pub mod guard;
pub mod telnet;

pub use error::DeviceError;
pub use guard::{DeviceGuard, GuardedSession};
pub use telnet::TelnetSessionFactory;

use async_trait::async_trait;
use std::time::Duration;

/// Per-command read options.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandOptions {
    pub timeout: Duration,
    /// Overrides the session prompt as the end-of-response marker.
    pub expect_prompt: Option<String>,
}

impl CommandOptions {
    pub fn with_timeout(timeout: Duration) -> Self {
        Self {
            timeout,
            expect_prompt: None,
        }
    }

    pub fn expecting(mut self, prompt: impl Into<String>) -> Self {
        self.expect_prompt = Some(prompt.into());
        self
    }
}

/// One open, authenticated login on the device.
#[async_trait]
pub trait DeviceSession: Send {
    /// Send a command and return its cleaned response text.
    async fn send_command(
        &mut self,
        command: &str,
        options: &CommandOptions,
    ) -> Result<String, DeviceError>;

    /// Log out and release the connection.
    async fn close(&mut self) -> Result<(), DeviceError>;
}

#[async_trait]
pub trait SessionFactory: Send + Sync {
    async fn open(&self) -> Result<Box<dyn DeviceSession>, DeviceError>;
}
