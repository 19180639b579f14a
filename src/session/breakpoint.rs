use super::{short_file_path, LocationSpec, Phase, Session};
use crate::error::Error;
use crate::host::MarkerKind;
use crate::rpc::Breakpoint;
use crate::weak_error;
use log::{info, warn};

impl Session {
    /// Create a breakpoint at a location given by command arguments,
    /// see [`LocationSpec::from_args`].
    pub fn create_breakpoint(&self, args: &[String]) -> Result<Breakpoint, Error> {
        let _slot = self.slot.acquire()?;
        self.ensure_phase(&[Phase::Running, Phase::Stopped])?;

        let location = LocationSpec::from_args(args, self.editor.as_ref())?;
        let mut bp = self
            .transport
            .create_breakpoint(&location.request())
            .map_err(|e| {
                self.reconcile_transport_error(&e, false);
                e
            })?;
        if let Some(name) = location.display_name() {
            bp.name = Some(name);
        }

        let marker = weak_error!(
            self.host
                .place_marker(MarkerKind::Breakpoint, bp.id, &bp.file, bp.line),
            "place breakpoint marker:"
        );
        {
            let mut state = self.state.lock().unwrap();
            state.breakpoints.insert(bp.id, bp.clone());
            if let Some(handle) = marker {
                state.markers.insert(bp.id, handle);
            }
        }

        let cwd = self.cwd();
        let name = bp.name.as_ref().map(|n| format!(" ({n})")).unwrap_or_default();
        let msg = format!(
            "Breakpoint {}{name} set at {}:{}",
            bp.id,
            short_file_path(&bp.file, &cwd),
            bp.line
        );
        info!(target: "dlvctl", "{msg}");
        self.log(&msg);

        Ok(bp)
    }

    /// Delete a breakpoint by id. Local state is updated first, a server failure is only logged.
    pub fn delete_breakpoint(&self, id: i64) -> Result<Breakpoint, Error> {
        let _slot = self.slot.acquire()?;

        let bp = {
            let mut state = self.state.lock().unwrap();
            if !state.breakpoints.contains_key(&id) {
                return Err(Error::BreakpointNotFound(id));
            }
            if let Some(handle) = state.markers.shift_remove(&id) {
                weak_error!(self.host.remove_marker(handle), "remove breakpoint marker:");
            }
            state
                .breakpoints
                .shift_remove(&id)
                .ok_or(Error::BreakpointNotFound(id))?
        };

        match self.transport.clear_breakpoint(id) {
            Ok(()) => self.log(&format!("Breakpoint {id} cleared")),
            Err(e) => {
                warn!(target: "dlvctl", "clear breakpoint {id} on server: {e}");
                self.reconcile_transport_error(&e, false);
                self.log(&format!("Breakpoint {id} cleared locally, server: {e}"));
            }
        }

        Ok(bp)
    }
}
