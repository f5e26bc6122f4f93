use super::{CollectReport, SyncContext};
use crate::data::models::{Category, PonPort};
use crate::device::GuardedSession;
use crate::parsers::ParseError;
use crate::sync::SyncError;
use tracing::{debug, warn};

/// The per-port ONT status table; its summary line carries the ONU count.
pub(super) fn ont_status_command(port: PonPort) -> String {
    format!("show equipment ont status pon {port}")
}

/// Why a single port could not be collected.
pub(super) enum UnitFailure {
    /// Recoverable: log, record and move on to the next port.
    Skip(String),
    /// The session is unusable; the collector aborts.
    Abort(SyncError),
}

impl SyncContext {
    /// Send the ONT status command for `port`, classifying failures for per-port loops.
    pub(super) async fn port_status(
        &self,
        session: &mut GuardedSession,
        port: PonPort,
    ) -> Result<String, UnitFailure> {
        match session
            .send_command(&ont_status_command(port), &self.timeouts.port_status())
            .await
        {
            Ok(raw) => Ok(raw),
            Err(e) if e.is_recoverable() => Err(UnitFailure::Skip(e.to_string())),
            Err(e) => Err(UnitFailure::Abort(e.into())),
        }
    }

    pub async fn collect_port_occupancy(&self) -> Result<CollectReport, SyncError> {
        let mut report = CollectReport::new(Category::PortOccupancy);
        let mut rows = Vec::new();
        let mut session = self.device.open().await?;

        let mut aborted = None;
        for port in self.layout.ports() {
            let raw = match self.port_status(&mut session, port).await {
                Ok(raw) => raw,
                Err(UnitFailure::Skip(reason)) => {
                    warn!(%port, %reason, "Port command failed, continuing");
                    report.failed_units.push(port.to_string());
                    continue;
                }
                Err(UnitFailure::Abort(e)) => {
                    aborted = Some(e);
                    break;
                }
            };

            match crate::parsers::ports::parse_port_occupancy(&raw, port) {
                Ok(parsed) => {
                    report.skipped += parsed.skipped.len();
                    if parsed.records.is_empty() {
                        debug!(%port, "No ONU count in port output");
                    }
                    rows.extend(parsed.records);
                }
                Err(e) => {
                    warn!(%port, error = %e, "Port returned no output");
                    report.failed_units.push(port.to_string());
                }
            }
        }
        session.close().await;

        if let Some(e) = aborted {
            return Err(e);
        }
        if rows.is_empty() && !report.failed_units.is_empty() {
            // Every scanned port failed; keep the previous table instead of emptying it.
            return Err(SyncError::Parse(ParseError::EmptyInput {
                category: Category::PortOccupancy,
            }));
        }

        report.records = rows.len();
        report.written = self.reconciler.port_occupancy(&rows).await?;
        Ok(report)
    }
}
