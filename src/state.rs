//! Application state shared by the web API and the sync service.

use crate::device::DeviceGuard;
use crate::sync::{JobQueue, Scheduler};
use dashmap::DashMap;
use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Instant;

/// Lifecycle of a long-running service, as reported by the service itself.
#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ServiceStatus {
    Starting,
    Active,
    Disabled,
    Error,
}

#[derive(Debug, Clone)]
struct ServiceHealth {
    status: ServiceStatus,
    since: Instant,
    detail: Option<String>,
}

/// One service in a status snapshot.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct ServiceReport {
    pub status: ServiceStatus,
    pub updated_secs_ago: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
}

/// Services report their own state here; the status endpoint reads it.
#[derive(Debug, Clone, Default)]
pub struct ServiceStatusRegistry {
    services: Arc<DashMap<&'static str, ServiceHealth>>,
}

impl ServiceStatusRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&self, service: &'static str, status: ServiceStatus) {
        self.record(service, status, None);
    }

    /// Mark a service as failed, keeping the reason for the status endpoint.
    pub fn set_error(&self, service: &'static str, detail: impl Into<String>) {
        self.record(service, ServiceStatus::Error, Some(detail.into()));
    }

    fn record(&self, service: &'static str, status: ServiceStatus, detail: Option<String>) {
        self.services.insert(
            service,
            ServiceHealth {
                status,
                since: Instant::now(),
                detail,
            },
        );
    }

    pub fn get(&self, service: &str) -> Option<ServiceStatus> {
        self.services.get(service).map(|health| health.status)
    }

    pub fn snapshot(&self) -> BTreeMap<&'static str, ServiceReport> {
        self.services
            .iter()
            .map(|entry| {
                let health = entry.value();
                (
                    *entry.key(),
                    ServiceReport {
                        status: health.status,
                        updated_secs_ago: health.since.elapsed().as_secs(),
                        detail: health.detail.clone(),
                    },
                )
            })
            .collect()
    }

    /// Worst status across services: any error wins, then starting; nothing registered
    /// counts as disabled.
    pub fn overall(&self) -> ServiceStatus {
        let statuses: Vec<ServiceStatus> = self.services.iter().map(|e| e.status).collect();
        if statuses.contains(&ServiceStatus::Error) {
            ServiceStatus::Error
        } else if statuses.is_empty() {
            ServiceStatus::Disabled
        } else if statuses.contains(&ServiceStatus::Starting) {
            ServiceStatus::Starting
        } else {
            ServiceStatus::Active
        }
    }
}

#[derive(Clone)]
pub struct AppState {
    pub queue: JobQueue,
    pub scheduler: Scheduler,
    pub device: DeviceGuard,
    pub service_statuses: ServiceStatusRegistry,
}

impl AppState {
    pub fn new(queue: JobQueue, scheduler: Scheduler, device: DeviceGuard) -> Self {
        Self {
            queue,
            scheduler,
            device,
            service_statuses: ServiceStatusRegistry::new(),
        }
    }
}
