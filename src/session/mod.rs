//! Debug session controller.
//!
//! A [`Session`] drives a headless debugger server through a [`Transport`] and keeps host markers
//! (one per breakpoint plus a current line marker) and a session log consistent with the debugee
//! run state.
//!
//! Structured commands (create/delete breakpoint, continue, step, restart) occupy a single
//! command slot, a second structured command issued while one is outstanding is rejected with
//! [`Error::Busy`]. Free-text commands go through the [`bridge::CommandBridge`] and are serialized
//! by it independently of the slot.

pub mod bridge;
mod breakpoint;
mod execution;
pub mod location;
pub mod table;

pub use execution::{context_summary, short_file_path, step_message, stop_message};
pub use location::LocationSpec;

use crate::command::SessionCommand;
use crate::config::Config;
use crate::error::{Error, ErrorKind};
use crate::host::{EditorContext, HostUi, MarkerHandle, MarkerKind};
use crate::rpc::{Breakpoint, DebuggerState, RpcClient, Thread, Transport, Variable};
use crate::supervisor::{ExitInfo, ServerHandle, Supervisor};
use crate::weak_error;
use bridge::{CommandBridge, TextSink};
use indexmap::IndexMap;
use log::{debug, error, info, warn};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Condvar, Mutex, Weak};
use std::thread::{self, JoinHandle};
use std::time::Duration;
use strum_macros::Display;
use table::CommandTable;

/// Session execution phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Display)]
pub enum Phase {
    #[default]
    #[strum(serialize = "not started")]
    NotStarted,
    #[strum(serialize = "starting")]
    Starting,
    #[strum(serialize = "running")]
    Running,
    #[strum(serialize = "stopped")]
    Stopped,
    #[strum(serialize = "exited")]
    Exited,
    #[strum(serialize = "failed")]
    Failed,
}

/// In-memory record of a debug session.
#[derive(Debug, Default)]
pub struct SessionState {
    pub phase: Phase,
    /// Debugee pid, valid in running and stopped phases.
    pub process_id: Option<i32>,
    pub breakpoints: IndexMap<i64, Breakpoint>,
    /// Breakpoint markers, keys are always a subset of `breakpoints` keys.
    pub markers: IndexMap<i64, MarkerHandle>,
    pub current_thread: Option<Thread>,
    /// Locals of a current thread goroutine, replaced on each stop.
    pub locals: Vec<Variable>,
}

/// Current line marker. At most one exists at any time.
///
/// `generation` changes on every stop and every move into a non-stopped phase,
/// placement requested for a stale generation is ignored.
#[derive(Default)]
struct PcSign {
    handle: Option<MarkerHandle>,
    generation: u64,
}

/// Shared part of a current line marker, used by session and refresh tasks.
#[derive(Clone)]
pub(crate) struct PcSignal {
    sign: Arc<Mutex<PcSign>>,
    host: Arc<dyn HostUi>,
}

impl PcSignal {
    fn new(host: Arc<dyn HostUi>) -> Self {
        Self {
            sign: Arc::default(),
            host,
        }
    }

    /// Start a new generation, return it.
    fn next_generation(&self) -> u64 {
        let mut sign = self.sign.lock().unwrap();
        sign.generation += 1;
        sign.generation
    }

    /// Remove a marker and invalidate pending placements.
    fn clear(&self) {
        let mut sign = self.sign.lock().unwrap();
        sign.generation += 1;
        if let Some(handle) = sign.handle.take() {
            weak_error!(self.host.remove_marker(handle), "remove current line marker:");
        }
    }

    /// Move marker to a thread location if `generation` is still actual.
    pub(crate) fn place(&self, generation: u64, thread: &Thread) -> anyhow::Result<()> {
        let mut sign = self.sign.lock().unwrap();
        if sign.generation != generation {
            debug!(target: "dlvctl", "skip stale current line marker for {}:{}", thread.file, thread.line);
            return Ok(());
        }
        if let Some(handle) = sign.handle.take() {
            self.host.remove_marker(handle)?;
        }
        sign.handle = Some(self.host.place_marker(
            MarkerKind::ProgramCounter,
            thread.id,
            &thread.file,
            thread.line,
        )?);
        Ok(())
    }

    fn handle(&self) -> Option<MarkerHandle> {
        self.sign.lock().unwrap().handle
    }
}

/// Single slot for an in-flight structured command.
#[derive(Default)]
struct CommandSlot {
    busy: Mutex<bool>,
    released: Condvar,
}

struct SlotGuard<'a> {
    slot: &'a CommandSlot,
}

impl CommandSlot {
    fn acquire(&self) -> Result<SlotGuard<'_>, Error> {
        let mut busy = self.busy.lock().unwrap();
        if *busy {
            return Err(Error::Busy);
        }
        *busy = true;
        Ok(SlotGuard { slot: self })
    }

    /// Wait until slot is free, return false on timeout.
    fn wait_idle(&self, timeout: Duration) -> bool {
        let busy = self.busy.lock().unwrap();
        let (busy, _) = self
            .released
            .wait_timeout_while(busy, timeout, |busy| *busy)
            .unwrap();
        !*busy
    }
}

impl Drop for SlotGuard<'_> {
    fn drop(&mut self) {
        *self.slot.busy.lock().unwrap() = false;
        self.slot.released.notify_all();
    }
}

pub struct Session {
    state: Mutex<SessionState>,
    transport: Arc<dyn Transport>,
    host: Arc<dyn HostUi>,
    editor: Arc<dyn EditorContext>,
    server: Option<ServerHandle>,
    slot: CommandSlot,
    pc_sign: PcSignal,
    bridge: CommandBridge,
}

impl Session {
    /// Start a debugger server for a `target` package and connect to it.
    pub fn launch(
        config: &Config,
        target: &Path,
        host: Arc<dyn HostUi>,
        editor: Arc<dyn EditorContext>,
    ) -> Result<Arc<Session>, Error> {
        let server = Supervisor::start(config, target)?;
        debug!(target: "dlvctl", "session phase: {}", Phase::Starting);
        weak_error!(host.append_log(&format!(
            "Debugger server started (pid {}), connecting to {}",
            server.pid(),
            config.listen
        )));

        let client = match RpcClient::connect(&config.listen, config.connect_timeout()) {
            Ok(client) => client,
            Err(e) => {
                error!(target: "dlvctl", "session {}: {e}, server output:\n{}", Phase::Failed, server.output());
                weak_error!(server.terminate());
                return Err(e);
            }
        };

        let session = match Self::new(Arc::new(client), host, editor, Some(server.clone())) {
            Ok(session) => session,
            Err(e) => {
                weak_error!(server.terminate());
                return Err(e);
            }
        };

        let weak = Arc::downgrade(&session);
        let monitored = server.clone();
        let spawned = thread::Builder::new()
            .name("session-monitor".to_string())
            .spawn(move || {
                let exit = monitored.wait();
                if let Some(session) = Weak::upgrade(&weak) {
                    session.on_server_exit(exit);
                }
            });
        if let Err(e) = spawned {
            error!(target: "dlvctl", "spawn session monitor: {e}");
            session.transport.close();
            weak_error!(server.terminate());
            return Err(Error::Spawn(e));
        }

        Ok(session)
    }

    /// Create a session over an already connected transport.
    pub fn attach(
        transport: Arc<dyn Transport>,
        host: Arc<dyn HostUi>,
        editor: Arc<dyn EditorContext>,
    ) -> Result<Arc<Session>, Error> {
        Self::new(transport, host, editor, None)
    }

    fn new(
        transport: Arc<dyn Transport>,
        host: Arc<dyn HostUi>,
        editor: Arc<dyn EditorContext>,
        server: Option<ServerHandle>,
    ) -> Result<Arc<Session>, Error> {
        let pid = transport.process_pid()?;
        let server_state = transport.get_state()?;

        let phase = if server_state.exited {
            Phase::Exited
        } else if server_state.running {
            Phase::Running
        } else {
            Phase::Stopped
        };

        let session = Arc::new_cyclic(|weak: &Weak<Session>| {
            let bridge = CommandBridge::new(
                Arc::new(CommandTable::new(Arc::clone(&transport), weak.clone())),
                Arc::new(TextSink::stdout()),
            );
            Session {
                state: Mutex::new(SessionState {
                    phase,
                    process_id: Some(pid),
                    current_thread: server_state.current_thread,
                    ..Default::default()
                }),
                pc_sign: PcSignal::new(Arc::clone(&host)),
                transport,
                host,
                editor,
                server,
                slot: CommandSlot::default(),
                bridge,
            }
        });
        session.sync_breakpoints();

        info!(target: "dlvctl", "session attached to process {pid}, phase: {phase}");
        weak_error!(session
            .host
            .append_log(&format!("Type 'help' for list of commands. Process {pid} {phase}")));
        Ok(session)
    }

    /// Adopt breakpoints that a server already has (user visible only).
    fn sync_breakpoints(&self) {
        let Some(breakpoints) = weak_error!(self.transport.list_breakpoints(), "list breakpoints:")
        else {
            return;
        };

        let mut state = self.state.lock().unwrap();
        // non-positive ids are server internal breakpoints (panic, fatal throw)
        for bp in breakpoints.into_iter().filter(|bp| bp.id > 0) {
            if let Some(handle) = weak_error!(self.host.place_marker(
                MarkerKind::Breakpoint,
                bp.id,
                &bp.file,
                bp.line
            )) {
                state.markers.insert(bp.id, handle);
            }
            state.breakpoints.insert(bp.id, bp);
        }
    }

    fn on_server_exit(&self, exit: ExitInfo) {
        let phase = {
            let mut state = self.state.lock().unwrap();
            if matches!(state.phase, Phase::Exited | Phase::Failed) {
                return;
            }
            state.phase = if exit.success() {
                Phase::Exited
            } else {
                Phase::Failed
            };
            state.process_id = None;
            state.phase
        };
        self.pc_sign.clear();
        warn!(target: "dlvctl", "debugger server terminated ({exit}), session {phase}");
        weak_error!(self
            .host
            .append_log(&format!("Debugger server terminated: {exit}")));
    }

    pub fn phase(&self) -> Phase {
        self.state.lock().unwrap().phase
    }

    pub fn process_id(&self) -> Option<i32> {
        self.state.lock().unwrap().process_id
    }

    pub fn breakpoints(&self) -> Vec<Breakpoint> {
        self.state.lock().unwrap().breakpoints.values().cloned().collect()
    }

    /// Breakpoint ids that have a marker.
    pub fn marked_breakpoints(&self) -> Vec<i64> {
        self.state.lock().unwrap().markers.keys().copied().collect()
    }

    pub fn current_thread(&self) -> Option<Thread> {
        self.state.lock().unwrap().current_thread.clone()
    }

    pub fn locals(&self) -> Vec<Variable> {
        self.state.lock().unwrap().locals.clone()
    }

    /// Current line marker handle if any.
    pub fn pc_marker(&self) -> Option<MarkerHandle> {
        self.pc_sign.handle()
    }

    /// Output of a supervised debugger server.
    pub fn server_output(&self) -> Option<String> {
        self.server.as_ref().map(ServerHandle::output)
    }

    /// Query execution state from a server.
    pub fn state(&self) -> Result<DebuggerState, Error> {
        let state = self.transport.get_state()?;
        debug!(target: "dlvctl", "state: {state:?}");
        Ok(state)
    }

    fn ensure_phase(&self, allowed: &[Phase]) -> Result<(), Error> {
        let phase = self.phase();
        if allowed.contains(&phase) {
            Ok(())
        } else {
            Err(Error::InvalidPhase(phase))
        }
    }

    fn set_phase(&self, phase: Phase) {
        self.state.lock().unwrap().phase = phase;
        debug!(target: "dlvctl", "session phase: {phase}");
    }

    /// Mark session as failed if transport error means that the debugee state is unknown:
    /// connection is lost or an execution command was in flight.
    fn reconcile_transport_error(&self, err: &Error, execution_in_flight: bool) {
        if err.kind() != ErrorKind::Transport {
            return;
        }
        if err.is_fatal() || execution_in_flight {
            self.set_phase(Phase::Failed);
            self.pc_sign.clear();
            error!(target: "dlvctl", "session failed: {err}");
        }
    }

    fn log(&self, text: &str) {
        weak_error!(self.host.append_log(text), "append session log:");
    }

    fn cwd(&self) -> String {
        weak_error!(self.editor.current_working_directory())
            .map(|p: PathBuf| p.to_string_lossy().to_string())
            .unwrap_or_default()
    }

    /// Send a free-text command to an internal debugger command table.
    /// Captured output is appended to the session log.
    pub fn send_command(&self, raw: &str) -> Result<Vec<u8>, Error> {
        let output = self.bridge.send(raw)?;
        self.log(&format!("(dlv) {}", raw.trim()));
        if !output.is_empty() {
            self.log(String::from_utf8_lossy(&output).trim_end_matches('\n'));
        }
        Ok(output)
    }

    /// Ask a user for a free-text command and send it.
    pub fn prompt_command(&self) -> Result<Vec<u8>, Error> {
        let raw = self.host.prompt_line("(dlv) ", None).map_err(Error::Host)?;
        if raw.trim().is_empty() {
            return Ok(vec![]);
        }
        self.send_command(&raw)
    }

    /// Execute a command in a separate thread, errors are reported through a host.
    pub fn dispatch(self: &Arc<Self>, cmd: SessionCommand) -> Option<JoinHandle<()>> {
        let session = Arc::clone(self);
        let spawned = thread::Builder::new()
            .name("session-command".to_string())
            .spawn(move || {
                let result = match cmd {
                    SessionCommand::Break(args) => session.create_breakpoint(&args).map(|_| ()),
                    SessionCommand::Clear(id) => session.delete_breakpoint(id).map(|_| ()),
                    SessionCommand::Continue => session.continue_execution().map(|_| ()),
                    SessionCommand::Next => session.step().map(|_| ()),
                    SessionCommand::Restart => session.restart().map(|_| ()),
                    SessionCommand::Raw(raw) => session.send_command(&raw).map(|_| ()),
                    SessionCommand::Prompt => session.prompt_command().map(|_| ()),
                    SessionCommand::Quit => Ok(()),
                };
                if let Err(e) = result {
                    warn!(target: "dlvctl", "command failed: {e:#}");
                    session.host.show_error(&format!("{e:#}"));
                }
            });
        weak_error!(spawned, "spawn command thread:")
    }

    /// End a session: wait for an outstanding command, clear markers, close the connection
    /// and then terminate a server.
    pub fn close(&self, timeout: Duration) -> Result<(), Error> {
        let settled = self.slot.wait_idle(timeout);
        // hold the slot (if possible) so no new structured command starts while closing
        let _slot = self.slot.acquire().ok();
        if !settled {
            warn!(target: "dlvctl", "outstanding command not settled in {timeout:?}");
            self.set_phase(Phase::Failed);
        }

        self.pc_sign.clear();
        {
            let mut state = self.state.lock().unwrap();
            for (_, handle) in state.markers.drain(..) {
                weak_error!(self.host.remove_marker(handle), "remove breakpoint marker:");
            }
            if state.phase != Phase::Failed {
                state.phase = Phase::Exited;
            }
            state.process_id = None;
        }

        if self.server.is_some() {
            muted_detach(self.transport.as_ref());
        }
        self.transport.close();

        if let Some(server) = &self.server {
            server.terminate()?;
            if server.wait_timeout(timeout).is_none() {
                return Err(Error::Timeout("debugger server termination"));
            }
        }

        if settled {
            Ok(())
        } else {
            Err(Error::Timeout("outstanding command"))
        }
    }
}

fn muted_detach(transport: &dyn Transport) {
    crate::muted_error!(transport.detach(true), "detach:");
}
