use dlvctl::error::Error;
use dlvctl::host::{EditorContext, HostUi, MarkerHandle, MarkerKind};
use dlvctl::rpc::{
    Breakpoint, DebuggerState, Function, Goroutine, Location, Thread, Transport, Variable,
};
use std::collections::{HashMap, VecDeque};
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, AtomicI32, AtomicI64, AtomicU64, Ordering};
use std::sync::mpsc::{self, Receiver};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::{Duration, Instant};

pub const CWD: &str = "/src/app";

pub fn thread_at(line: u64, pc: u64, bp: Option<Breakpoint>) -> Thread {
    Thread {
        id: 1,
        pc,
        file: format!("{CWD}/a.go"),
        line,
        function: Some(Function {
            name: "F".to_string(),
        }),
        goroutine_id: 3,
        breakpoint: bp,
    }
}

pub fn stopped_at(thread: Thread) -> DebuggerState {
    DebuggerState {
        running: false,
        current_thread: Some(thread),
        ..Default::default()
    }
}

pub fn exited(status: i64) -> DebuggerState {
    DebuggerState {
        exited: true,
        exit_status: status,
        ..Default::default()
    }
}

/// Scripted debugger server.
#[derive(Default)]
pub struct MockTransport {
    next_id: AtomicI64,
    pub pid: AtomicI32,
    pub calls: Mutex<Vec<String>>,
    pub create_requests: Mutex<Vec<Breakpoint>>,
    /// State returned by `get_state`.
    pub state: Mutex<DebuggerState>,
    /// Batches of states for subsequent `continue_execution` calls.
    pub continue_script: Mutex<VecDeque<Vec<DebuggerState>>>,
    /// `continue_execution` waits for a signal on this channel (if set) before sending states.
    pub continue_gate: Mutex<Option<Receiver<()>>>,
    pub next_script: Mutex<VecDeque<Result<DebuggerState, Error>>>,
    pub server_breakpoints: Mutex<Vec<Breakpoint>>,
    pub fail_clear: AtomicBool,
    pub fail_restart: AtomicBool,
    pub fail_pid: AtomicBool,
}

impl MockTransport {
    pub fn stopped() -> Self {
        let transport = Self::default();
        transport.pid.store(100, Ordering::SeqCst);
        *transport.state.lock().unwrap() = stopped_at(thread_at(1, 0x0, None));
        transport
    }

    pub fn running() -> Self {
        let transport = Self::stopped();
        *transport.state.lock().unwrap() = DebuggerState {
            running: true,
            ..Default::default()
        };
        transport
    }

    pub fn script_continue(&self, states: Vec<DebuggerState>) {
        self.continue_script.lock().unwrap().push_back(states);
    }

    pub fn script_next(&self, result: Result<DebuggerState, Error>) {
        self.next_script.lock().unwrap().push_back(result);
    }

    pub fn called(&self, method: &str) -> usize {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .filter(|c| c.as_str() == method)
            .count()
    }

    fn record(&self, method: &str) {
        self.calls.lock().unwrap().push(method.to_string());
    }
}

impl Transport for MockTransport {
    fn create_breakpoint(&self, request: &Breakpoint) -> Result<Breakpoint, Error> {
        self.record("create_breakpoint");
        self.create_requests.lock().unwrap().push(request.clone());
        let id = self.next_id.fetch_add(1, Ordering::SeqCst) + 1;
        let mut bp = request.clone();
        bp.id = id;
        if bp.file.is_empty() {
            bp.file = format!("{CWD}/handler.go");
            bp.line = 5;
        }
        Ok(bp)
    }

    fn clear_breakpoint(&self, id: i64) -> Result<(), Error> {
        self.record("clear_breakpoint");
        if self.fail_clear.load(Ordering::SeqCst) {
            return Err(Error::Rpc {
                method: "RPCServer.ClearBreakpoint".to_string(),
                message: format!("no breakpoint with id {id}"),
            });
        }
        Ok(())
    }

    fn continue_execution(&self) -> Receiver<DebuggerState> {
        self.record("continue_execution");
        let (tx, rx) = mpsc::channel();
        let states = self
            .continue_script
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_default();
        let gate = self.continue_gate.lock().unwrap().take();
        thread::spawn(move || {
            if let Some(gate) = gate {
                _ = gate.recv();
            }
            for state in states {
                if tx.send(state).is_err() {
                    break;
                }
            }
        });
        rx
    }

    fn next(&self) -> Result<DebuggerState, Error> {
        self.record("next");
        self.next_script
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or(Err(Error::ConnectionClosed))
    }

    fn restart(&self) -> Result<(), Error> {
        self.record("restart");
        if self.fail_restart.load(Ordering::SeqCst) {
            return Err(Error::Rpc {
                method: "RPCServer.Restart".to_string(),
                message: "cannot restart".to_string(),
            });
        }
        self.pid.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn process_pid(&self) -> Result<i32, Error> {
        self.record("process_pid");
        if self.fail_pid.load(Ordering::SeqCst) {
            return Err(Error::Rpc {
                method: "RPCServer.ProcessPid".to_string(),
                message: "no process".to_string(),
            });
        }
        Ok(self.pid.load(Ordering::SeqCst))
    }

    fn list_goroutines(&self) -> Result<Vec<Goroutine>, Error> {
        self.record("list_goroutines");
        let goroutine = |id, line| Goroutine {
            id,
            user_current_loc: Location {
                file: format!("{CWD}/a.go"),
                line,
                function: Some(Function {
                    name: "F".to_string(),
                }),
                ..Default::default()
            },
            ..Default::default()
        };
        Ok(vec![goroutine(1, 20), goroutine(3, 10)])
    }

    fn get_state(&self) -> Result<DebuggerState, Error> {
        self.record("get_state");
        Ok(self.state.lock().unwrap().clone())
    }

    fn list_functions(&self, filter: &str) -> Result<Vec<String>, Error> {
        self.record("list_functions");
        Ok(["main.main", "main.worker", "pkg.handler"]
            .into_iter()
            .filter(|f| f.contains(filter))
            .map(ToString::to_string)
            .collect())
    }

    fn list_local_vars(&self, _goroutine_id: i64) -> Result<Vec<Variable>, Error> {
        self.record("list_local_vars");
        Ok(vec![Variable {
            name: "x".to_string(),
            r#type: "int".to_string(),
            value: "42".to_string(),
            children: vec![],
        }])
    }

    fn list_breakpoints(&self) -> Result<Vec<Breakpoint>, Error> {
        self.record("list_breakpoints");
        Ok(self.server_breakpoints.lock().unwrap().clone())
    }

    fn detach(&self, _kill: bool) -> Result<(), Error> {
        self.record("detach");
        Ok(())
    }

    fn close(&self) {
        self.record("close");
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct PlacedMarker {
    pub kind: MarkerKind,
    pub id: i64,
    pub file: String,
    pub line: u64,
}

/// Host that records everything a session does with it.
#[derive(Default)]
pub struct RecordingHost {
    next_handle: AtomicU64,
    pub markers: Mutex<HashMap<MarkerHandle, PlacedMarker>>,
    pub log: Mutex<Vec<String>>,
    pub errors: Mutex<Vec<String>>,
    pub contexts: Mutex<Vec<String>>,
    pub cursor: Mutex<Option<(String, u64)>>,
    pub centered: AtomicU64,
    pub fail_cursor: AtomicBool,
    /// Cursor position reported to a session as an editor location.
    pub editor_cursor: Mutex<Option<(String, u64)>>,
    pub prompt_answer: Mutex<String>,
}

impl RecordingHost {
    pub fn live_markers(&self, kind: MarkerKind) -> Vec<PlacedMarker> {
        self.markers
            .lock()
            .unwrap()
            .values()
            .filter(|m| m.kind == kind)
            .cloned()
            .collect()
    }

    pub fn log_contains(&self, line: &str) -> bool {
        self.log.lock().unwrap().iter().any(|l| l == line)
    }
}

impl HostUi for RecordingHost {
    fn place_marker(
        &self,
        kind: MarkerKind,
        id: i64,
        file: &str,
        line: u64,
    ) -> anyhow::Result<MarkerHandle> {
        let handle = MarkerHandle(self.next_handle.fetch_add(1, Ordering::SeqCst));
        self.markers.lock().unwrap().insert(
            handle,
            PlacedMarker {
                kind,
                id,
                file: file.to_string(),
                line,
            },
        );
        Ok(handle)
    }

    fn remove_marker(&self, handle: MarkerHandle) -> anyhow::Result<()> {
        self.markers
            .lock()
            .unwrap()
            .remove(&handle)
            .map(|_| ())
            .ok_or_else(|| anyhow::anyhow!("unknown marker {handle}"))
    }

    fn set_cursor(&self, file: &str, line: u64) -> anyhow::Result<()> {
        if self.fail_cursor.load(Ordering::SeqCst) {
            anyhow::bail!("window is gone");
        }
        *self.cursor.lock().unwrap() = Some((file.to_string(), line));
        Ok(())
    }

    fn center_view(&self) -> anyhow::Result<()> {
        self.centered.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn append_log(&self, text: &str) -> anyhow::Result<()> {
        self.log
            .lock()
            .unwrap()
            .extend(text.lines().map(ToString::to_string));
        Ok(())
    }

    fn render_context(&self, summary: &str) -> anyhow::Result<()> {
        self.contexts.lock().unwrap().push(summary.to_string());
        Ok(())
    }

    fn show_error(&self, message: &str) {
        self.errors.lock().unwrap().push(message.to_string());
    }

    fn prompt_line(&self, _prompt: &str, _prefill: Option<&str>) -> anyhow::Result<String> {
        Ok(self.prompt_answer.lock().unwrap().clone())
    }
}

impl EditorContext for RecordingHost {
    fn current_cursor_position(&self) -> anyhow::Result<(String, u64)> {
        self.editor_cursor
            .lock()
            .unwrap()
            .clone()
            .ok_or_else(|| anyhow::anyhow!("no cursor"))
    }

    fn current_working_directory(&self) -> anyhow::Result<PathBuf> {
        Ok(PathBuf::from(CWD))
    }
}

/// Poll a condition until it holds or a timeout expires.
pub fn wait_for(what: &str, cond: impl Fn() -> bool) {
    let deadline = Instant::now() + Duration::from_secs(5);
    while !cond() {
        assert!(Instant::now() < deadline, "timeout waiting for {what}");
        thread::sleep(Duration::from_millis(10));
    }
}

pub struct Env {
    pub transport: Arc<MockTransport>,
    pub host: Arc<RecordingHost>,
    pub session: Arc<dlvctl::session::Session>,
}

pub fn attach(transport: MockTransport) -> Env {
    let transport = Arc::new(transport);
    let host = Arc::new(RecordingHost::default());
    let session =
        dlvctl::session::Session::attach(transport.clone(), host.clone(), host.clone()).unwrap();
    Env {
        transport,
        host,
        session,
    }
}
