use super::{CommandOptions, DeviceError, DeviceSession, SessionFactory};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{OwnedSemaphorePermit, Semaphore};
use tokio::time;
use tracing::{debug, trace, warn};

/// Single-slot gate in front of the session factory.
///
/// The device accepts one management login at a time, so every open goes through here.
#[derive(Clone)]
pub struct DeviceGuard {
    factory: Arc<dyn SessionFactory>,
    slot: Arc<Semaphore>,
    acquire_timeout: Duration,
}

impl DeviceGuard {
    pub fn new(factory: Arc<dyn SessionFactory>, acquire_timeout: Duration) -> Self {
        Self {
            factory,
            slot: Arc::new(Semaphore::new(1)),
            acquire_timeout,
        }
    }

    /// Wait for the device to become free, then open a session on it.
    pub async fn open(&self) -> Result<GuardedSession, DeviceError> {
        trace!("waiting for device session slot");
        let permit = time::timeout(self.acquire_timeout, self.slot.clone().acquire_owned())
            .await
            .map_err(|_| DeviceError::Busy(self.acquire_timeout))?
            .map_err(|_| DeviceError::Closed)?;

        let session = self.factory.open().await?;
        debug!("Device session opened");
        Ok(GuardedSession {
            session,
            _permit: permit,
        })
    }

    pub fn is_busy(&self) -> bool {
        self.slot.available_permits() == 0
    }
}

/// An open session that holds the device slot until it is closed or dropped.
pub struct GuardedSession {
    session: Box<dyn DeviceSession>,
    _permit: OwnedSemaphorePermit,
}

impl GuardedSession {
    pub async fn send_command(
        &mut self,
        command: &str,
        options: &CommandOptions,
    ) -> Result<String, DeviceError> {
        self.session.send_command(command, options).await
    }

    /// Close the session and release the slot. Close errors are only logged.
    pub async fn close(mut self) {
        if let Err(e) = self.session.close().await {
            warn!(error = %e, "Failed to close device session cleanly");
        }
        debug!("Device session closed");
    }
}
