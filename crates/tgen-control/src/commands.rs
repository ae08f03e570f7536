//! Composite console commands.
//!
//! Each command is a fixed sequence of fan-out stages. Every stage's result
//! goes to the client's [`Reporter`](crate::Reporter); the first bad stage
//! ends the sequence and is named in the returned result's
//! [`failed_stage`](CmdResult::failed_stage). Nothing is rolled back.

use tgen_core::PortId;

use crate::client::StatelessClient;
use crate::error::Result;
use crate::result::CmdResult;
use crate::selector::PortSelector;
use crate::types::StreamPack;

fn format_ports(ports: &[PortId]) -> String {
    let ids: Vec<String> = ports.iter().map(ToString::to_string).collect();
    format!("[{}]", ids.join(", "))
}

impl StatelessClient {
    /// Run one stage: report it, and mark it if it failed.
    fn stage(&self, desc: &str, rc: CmdResult) -> CmdResult {
        rc.annotate(desc, &*self.reporter);
        if rc.bad() {
            tracing::warn!(stage = %desc, "Stage failed");
            return rc.at_stage(desc);
        }
        rc
    }

    /// Requested ports that are currently active, in request order.
    fn active_among(&self, ports: &[PortId]) -> Vec<PortId> {
        let active = self.active_ports();
        let mut selected: Vec<PortId> = Vec::new();
        for id in ports {
            if active.contains(id) && !selected.contains(id) {
                selected.push(*id);
            }
        }
        selected
    }

    /// Bring every port to a clean, owned, idle state.
    ///
    /// Resync, force-acquire all, force-stop all, remove all streams.
    ///
    /// # Errors
    ///
    /// Returns an error if the server's sync data cannot be interpreted.
    pub async fn reset(&mut self) -> Result<CmdResult> {
        let rc = self.sync_with_server(false).await?;
        let rc = self.stage("Syncing with the server", rc);
        if rc.bad() {
            return Ok(rc);
        }

        let rc = self.acquire(PortSelector::All, true).await?;
        let rc = self.stage("Force acquiring all ports", rc);
        if rc.bad() {
            return Ok(rc);
        }

        let rc = self.stop_traffic(PortSelector::All, true).await?;
        let rc = self.stage("Stop traffic on all ports", rc);
        if rc.bad() {
            return Ok(rc);
        }

        let rc = self.remove_all_streams(PortSelector::All).await?;
        let rc = self.stage("Removing all streams from all ports", rc);
        if rc.bad() {
            return Ok(rc);
        }

        Ok(CmdResult::ok())
    }

    /// Stop traffic on those of `ports` that are active.
    ///
    /// Having nothing to stop is reported and counts as success.
    ///
    /// # Errors
    ///
    /// Returns an error if `ports` names a port that does not exist.
    pub async fn stop(&mut self, ports: impl Into<PortSelector>) -> Result<CmdResult> {
        let requested = ports.into().resolve(self.port_count())?;
        let active = self.active_among(&requested);
        if active.is_empty() {
            self.reporter.note("No active traffic on provided ports");
            return Ok(CmdResult::ok());
        }

        let rc = self.stop_traffic(active, false).await?;
        Ok(self.stage(
            &format!("Stopping traffic on port(s) {}", format_ports(&requested)),
            rc,
        ))
    }

    /// Replace the streams on `ports` with `streams` and start traffic.
    ///
    /// Active target ports are refused unless `force` is set, in which case
    /// they are stopped first. Then all existing streams are removed, the
    /// new ones attached, and traffic started at `multiplier`.
    ///
    /// # Errors
    ///
    /// Returns an error if `ports` names a port that does not exist.
    pub async fn start(
        &mut self,
        ports: impl Into<PortSelector>,
        streams: &[StreamPack],
        multiplier: f64,
        force: bool,
    ) -> Result<CmdResult> {
        let targets = ports.into().resolve(self.port_count())?;
        let active = self.active_among(&targets);

        let mut total = CmdResult::new();

        if !active.is_empty() {
            if !force {
                let rc = CmdResult::fail(format!(
                    "Port(s) {} are active - please stop them or add '--force'",
                    format_ports(&active)
                ));
                return Ok(self.stage("Checking for active ports", rc));
            }
            let rc = self.stop(active).await?;
            total.add(rc);
            if total.bad() {
                return Ok(total);
            }
        }

        let list = format_ports(&targets);

        let rc = self.remove_all_streams(targets.clone()).await?;
        total.add(self.stage(&format!("Removing all streams from ports {list}"), rc));
        if total.bad() {
            return Ok(total);
        }

        let rc = self.add_stream_pack(streams, targets.clone()).await?;
        total.add(self.stage(&format!("Attaching streams to port(s) {list}"), rc));
        if total.bad() {
            return Ok(total);
        }

        let rc = self.start_traffic(multiplier, targets).await?;
        total.add(self.stage(&format!("Starting traffic on ports {list}"), rc));
        Ok(total)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn port_list_formatting() {
        assert_eq!(format_ports(&[]), "[]");
        assert_eq!(format_ports(&[PortId::new(0), PortId::new(3)]), "[0, 3]");
    }
}
