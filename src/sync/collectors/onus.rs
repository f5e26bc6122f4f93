use super::ports::UnitFailure;
use super::{CollectReport, SyncContext};
use crate::data::models::{Category, Onu, PonPort};
use crate::parsers::ParseError;
use crate::parsers::onu::parse_onu_table;
use crate::sync::SyncError;
use tracing::{debug, info, warn};

impl SyncContext {
    /// Scrape and replace the ONUs of every configured port, or of `only` when given.
    ///
    /// Each port is replaced on its own; a port that fails keeps its previous rows.
    pub async fn collect_onus(&self, only: Option<PonPort>) -> Result<CollectReport, SyncError> {
        let ports: Vec<PonPort> = match only {
            Some(port) => vec![port],
            None => self.layout.ports().collect(),
        };

        let mut report = CollectReport::new(Category::Onus);
        let mut session = self.device.open().await?;

        let mut aborted = None;
        let mut write_error = None;
        for port in ports.iter().copied() {
            let raw = match self.port_status(&mut session, port).await {
                Ok(raw) => raw,
                Err(UnitFailure::Skip(reason)) => {
                    warn!(%port, %reason, "ONU table command failed, continuing");
                    report.failed_units.push(port.to_string());
                    continue;
                }
                Err(UnitFailure::Abort(e)) => {
                    aborted = Some(e);
                    break;
                }
            };

            let parsed = match parse_onu_table(&raw) {
                Ok(parsed) => parsed,
                Err(e) => {
                    warn!(%port, error = %e, "ONU table unreadable, keeping stored rows");
                    report.failed_units.push(port.to_string());
                    continue;
                }
            };

            let pon_path = port.to_string();
            let (onus, foreign): (Vec<Onu>, Vec<Onu>) = parsed
                .records
                .into_iter()
                .partition(|onu| onu.pon_path == pon_path);
            if !foreign.is_empty() {
                debug!(%port, count = foreign.len(), "Dropping rows of another PON port");
            }

            match self.reconciler.port_onus(port, &onus).await {
                Ok(written) => {
                    report.records += onus.len();
                    report.skipped += parsed.skipped.len() + foreign.len();
                    report.written += written;
                }
                Err(e) => {
                    warn!(%port, error = %e, "Failed to store ONUs of port, continuing");
                    report.failed_units.push(port.to_string());
                    write_error = Some(e);
                }
            }
        }
        session.close().await;

        if let Some(e) = aborted {
            return Err(e);
        }
        if report.failed_units.len() == ports.len() && !ports.is_empty() {
            return Err(write_error.unwrap_or(SyncError::Parse(ParseError::EmptyInput {
                category: Category::Onus,
            })));
        }

        info!(
            ports = ports.len(),
            failed = report.failed_units.len(),
            onus = report.records,
            "Collected ONU status"
        );
        Ok(report)
    }
}
