use super::{Phase, PcSignal, Session};
use crate::error::{Error, ErrorKind};
use crate::host::HostUi;
use crate::rpc::{DebuggerState, Goroutine, Thread, Transport};
use crate::weak_error;
use itertools::Itertools;
use log::{debug, info, warn};
use std::borrow::Cow;
use std::sync::Arc;
use std::thread;

/// Replace a `cwd` prefix of a file path with `.`.
pub fn short_file_path<'a>(file: &'a str, cwd: &str) -> Cow<'a, str> {
    let cwd = cwd.trim_end_matches('/');
    if cwd.is_empty() {
        return Cow::Borrowed(file);
    }
    match file.strip_prefix(cwd) {
        Some(rest) if rest.is_empty() || rest.starts_with('/') => Cow::Owned(format!(".{rest}")),
        _ => Cow::Borrowed(file),
    }
}

/// Session log line for a debugee stopped after continue.
pub fn stop_message(thread: &Thread, cwd: &str) -> String {
    let file = short_file_path(&thread.file, cwd);
    let func = thread.function_name();
    match &thread.breakpoint {
        Some(bp) => {
            let hits = match bp.hits_for(thread.goroutine_id) {
                Some(n) => format!(
                    "hits goroutine({}):{n} total:{}",
                    thread.goroutine_id, bp.total_hit_count
                ),
                None => format!("hits total:{}", bp.total_hit_count),
            };
            format!(
                "> {func}() {file}:{} ({hits}) (PC: {:#x})",
                thread.line, thread.pc
            )
        }
        None => format!("> {func}() {file}:{} (PC: {:#x})", thread.line, thread.pc),
    }
}

/// Session log line for a debugee stopped after step.
pub fn step_message(thread: &Thread, cwd: &str) -> String {
    format!(
        "> {}() {}:{} goroutine({}) (PC: {})",
        thread.function_name(),
        short_file_path(&thread.file, cwd),
        thread.line,
        thread.goroutine_id,
        thread.pc
    )
}

/// Summary of a stopped debugee, the goroutine of a current thread is marked with `*`.
pub fn context_summary(thread: &Thread, goroutines: &[Goroutine], cwd: &str) -> String {
    let header = format!(
        "thread {} at {}() {}:{}",
        thread.id,
        thread.function_name(),
        short_file_path(&thread.file, cwd),
        thread.line
    );
    let lines = goroutines.iter().map(|g| {
        let loc = &g.user_current_loc;
        let mark = if g.id == thread.goroutine_id { '*' } else { ' ' };
        format!(
            "{mark} goroutine({}) {}() {}:{}",
            g.id,
            loc.function.as_ref().map(|f| f.name.as_str()).unwrap_or_default(),
            short_file_path(&loc.file, cwd),
            loc.line
        )
    });
    std::iter::once(header).chain(lines).join("\n")
}

/// How a debugee reached a stop.
#[derive(Clone, Copy, PartialEq)]
enum StopKind {
    Continue,
    Step,
}

/// Run a host refresh effect in a separate thread, its failure is reported and otherwise ignored.
fn spawn_effect<F>(name: &'static str, host: Arc<dyn HostUi>, effect: F)
where
    F: FnOnce() -> anyhow::Result<()> + Send + 'static,
{
    let spawned = thread::Builder::new().name(name.to_string()).spawn(move || {
        if let Err(e) = effect() {
            warn!(target: "dlvctl", "{name}: {e:#}");
            host.show_error(&format!("{name}: {e:#}"));
        }
    });
    weak_error!(spawned, "spawn refresh task:");
}

impl Session {
    /// Resume debugee until it stops or exits.
    pub fn continue_execution(&self) -> Result<Phase, Error> {
        let _slot = self.slot.acquire()?;
        self.ensure_phase(&[Phase::Stopped])?;
        self.enter_running();

        let states = self.transport.continue_execution();
        let last = states
            .iter()
            .find(|s| s.exited || !s.running || s.err.is_some());
        self.ensure_not_ended()?;

        match last {
            None => {
                self.on_exit(None);
                Ok(Phase::Exited)
            }
            Some(state) if state.exited => self.exit_with(&state),
            Some(DebuggerState { err: Some(err), .. }) => {
                let err = Error::Rpc {
                    method: "Command".to_string(),
                    message: err,
                };
                self.reconcile_transport_error(&err, true);
                Err(err)
            }
            Some(state) => Ok(self.on_stop(state.current_thread, StopKind::Continue)),
        }
    }

    /// Step over to the next source line.
    pub fn step(&self) -> Result<Phase, Error> {
        let _slot = self.slot.acquire()?;
        self.ensure_phase(&[Phase::Stopped])?;
        let previous = self.current_thread();
        self.enter_running();

        let result = self.transport.next();
        self.ensure_not_ended()?;

        match result {
            Err(e) => {
                if e.kind() == ErrorKind::Transport && e.is_fatal() {
                    self.reconcile_transport_error(&e, true);
                } else {
                    // nothing happened to the debugee, go back to the previous stop
                    self.set_phase(Phase::Stopped);
                    if let Some(thread) = previous {
                        let generation = self.pc_sign.next_generation();
                        weak_error!(self.pc_sign.place(generation, &thread));
                    }
                }
                Err(e)
            }
            Ok(state) if state.exited => self.exit_with(&state),
            Ok(state) => Ok(self.on_stop(state.current_thread, StopKind::Step)),
        }
    }

    /// Restart debugee, return a new process id.
    pub fn restart(&self) -> Result<i32, Error> {
        let _slot = self.slot.acquire()?;
        self.ensure_phase(&[Phase::Stopped])?;

        self.transport.restart().map_err(|e| {
            self.reconcile_transport_error(&e, false);
            e
        })?;
        self.enter_running();
        {
            let mut state = self.state.lock().unwrap();
            state.process_id = None;
            state.current_thread = None;
            state.locals.clear();
        }

        let pid = self.transport.process_pid().map_err(|e| {
            self.reconcile_transport_error(&e, false);
            e
        })?;
        self.state.lock().unwrap().process_id = Some(pid);
        info!(target: "dlvctl", "debugee restarted, pid {pid}");
        self.log(&format!("Process restarted with PID {pid}"));

        if let Some(server_state) = weak_error!(self.transport.get_state(), "get state:") {
            if server_state.exited {
                self.on_exit(None);
            } else if !server_state.running {
                let mut state = self.state.lock().unwrap();
                state.phase = Phase::Stopped;
                state.current_thread = server_state.current_thread;
            }
        }

        Ok(pid)
    }

    /// Session may end (closed or server gone) while an execution command waits for a server,
    /// a late result must not bring it back.
    fn ensure_not_ended(&self) -> Result<(), Error> {
        match self.phase() {
            phase @ (Phase::Exited | Phase::Failed) => {
                debug!(target: "dlvctl", "drop execution result, session {phase}");
                Err(Error::InvalidPhase(phase))
            }
            _ => Ok(()),
        }
    }

    fn enter_running(&self) {
        self.set_phase(Phase::Running);
        self.pc_sign.clear();
    }

    fn exit_with(&self, state: &DebuggerState) -> Result<Phase, Error> {
        self.on_exit(Some(state.exit_status));
        match &state.err {
            Some(err) => Err(Error::Exited(Some(err.clone()))),
            None => Ok(Phase::Exited),
        }
    }

    fn on_exit(&self, status: Option<i64>) {
        let pid = {
            let mut state = self.state.lock().unwrap();
            state.phase = Phase::Exited;
            state.current_thread = None;
            state.locals.clear();
            state.process_id
        };
        self.pc_sign.clear();

        let pid = pid.map(|p| p.to_string()).unwrap_or_default();
        let msg = match status {
            Some(status) => format!("Process {pid} has exited with status {status}"),
            None => format!("Process {pid} has exited"),
        };
        info!(target: "dlvctl", "{msg}");
        self.log(&msg);
    }

    /// Record a stop, refresh host views and write a stop line into a session log.
    fn on_stop(&self, thread: Option<Thread>, kind: StopKind) -> Phase {
        let Some(thread) = thread else {
            self.set_phase(Phase::Stopped);
            debug!(target: "dlvctl", "debugee stopped without a current thread");
            return Phase::Stopped;
        };

        let locals = weak_error!(
            self.transport.list_local_vars(thread.goroutine_id),
            "list local variables:"
        );
        {
            let mut state = self.state.lock().unwrap();
            state.phase = Phase::Stopped;
            state.current_thread = Some(thread.clone());
            state.locals = locals.unwrap_or_default();
            if let Some(hit) = &thread.breakpoint {
                if let Some(bp) = state.breakpoints.get_mut(&hit.id) {
                    bp.hit_count = hit.hit_count.clone();
                    bp.total_hit_count = hit.total_hit_count;
                }
            }
        }

        let cwd = self.cwd();
        self.refresh_views(&thread, &cwd);

        let msg = match kind {
            StopKind::Continue => stop_message(&thread, &cwd),
            StopKind::Step => step_message(&thread, &cwd),
        };
        self.log(&msg);
        Phase::Stopped
    }

    /// Start independent refresh effects: context summary, current line marker and cursor.
    fn refresh_views(&self, thread: &Thread, cwd: &str) {
        let generation = self.pc_sign.next_generation();

        let transport: Arc<dyn Transport> = Arc::clone(&self.transport);
        let host = Arc::clone(&self.host);
        let (t, cwd) = (thread.clone(), cwd.to_string());
        spawn_effect("refresh-context", Arc::clone(&self.host), move || {
            let goroutines = transport.list_goroutines()?;
            host.render_context(&context_summary(&t, &goroutines, &cwd))
        });

        let pc_sign: PcSignal = self.pc_sign.clone();
        let t = thread.clone();
        spawn_effect("refresh-marker", Arc::clone(&self.host), move || {
            pc_sign.place(generation, &t)
        });

        let host = Arc::clone(&self.host);
        let t = thread.clone();
        spawn_effect("refresh-cursor", Arc::clone(&self.host), move || {
            host.set_cursor(&t.file, t.line)?;
            host.center_view()
        });
    }
}
