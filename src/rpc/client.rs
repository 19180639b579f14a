use super::types::*;
use super::Transport;
use crate::error::Error;
use log::{debug, warn};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use std::io::{BufRead, BufReader, Write};
use std::net::{Shutdown, TcpStream};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::mpsc::{self, Receiver, SyncSender};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::{Duration, Instant};

const CONNECT_RETRY_DELAY: Duration = Duration::from_millis(50);
const SERVICE: &str = "RPCServer";

/// Request envelope, a server expects exactly one parameter object.
#[derive(Debug, Serialize)]
struct RpcRequest<'a, P: Serialize> {
    method: &'a str,
    params: [P; 1],
    id: u64,
}

/// Response envelope, `error` is a string or null.
#[derive(Debug, Deserialize)]
struct RpcResponse {
    id: u64,
    #[serde(default)]
    result: Value,
    #[serde(default)]
    error: Option<Value>,
}

enum Reply {
    Ok(Value),
    Failed(String),
    Closed,
}

#[derive(Default)]
struct Pending {
    closed: bool,
    waiters: HashMap<u64, SyncSender<Reply>>,
}

struct Inner {
    addr: String,
    writer: Mutex<TcpStream>,
    pending: Mutex<Pending>,
    next_id: AtomicU64,
}

/// Json-rpc client of a headless debugger server.
///
/// Calls may be issued from many threads at once, a single reader thread routes responses
/// to callers by request id.
#[derive(Clone)]
pub struct RpcClient {
    inner: Arc<Inner>,
}

impl RpcClient {
    /// Connect to a server, retry until `timeout` elapsed (server may still be starting).
    pub fn connect(addr: &str, timeout: Duration) -> Result<Self, Error> {
        let start = Instant::now();
        let stream = loop {
            match TcpStream::connect(addr) {
                Ok(stream) => break stream,
                Err(err) => {
                    if start.elapsed() > timeout {
                        return Err(Error::Connect {
                            addr: addr.to_string(),
                            reason: err.to_string(),
                        });
                    }
                    thread::sleep(CONNECT_RETRY_DELAY);
                }
            }
        };
        stream.set_nodelay(true)?;
        let reader = BufReader::new(stream.try_clone()?);

        let inner = Arc::new(Inner {
            addr: addr.to_string(),
            writer: Mutex::new(stream),
            pending: Mutex::new(Pending::default()),
            next_id: AtomicU64::new(1),
        });

        let read_half = Arc::clone(&inner);
        thread::Builder::new()
            .name("rpc-reader".to_string())
            .spawn(move || read_loop(reader, &read_half))?;

        debug!(target: "rpc", "connected to {addr}");
        Ok(Self { inner })
    }

    pub fn addr(&self) -> &str {
        &self.inner.addr
    }

    fn call<P: Serialize, R: DeserializeOwned>(&self, method: &str, params: P) -> Result<R, Error> {
        let method = format!("{SERVICE}.{method}");
        let id = self.inner.next_id.fetch_add(1, Ordering::Relaxed);
        let (tx, rx) = mpsc::sync_channel(1);
        {
            let mut pending = self.inner.pending.lock().unwrap();
            if pending.closed {
                return Err(Error::ConnectionClosed);
            }
            pending.waiters.insert(id, tx);
        }

        let mut payload = serde_json::to_vec(&RpcRequest {
            method: &method,
            params: [params],
            id,
        })?;
        payload.push(b'\n');

        debug!(target: "rpc", "-> {method} #{id}");
        let write_result = {
            let mut stream = self.inner.writer.lock().unwrap();
            stream.write_all(&payload).and_then(|_| stream.flush())
        };
        if let Err(e) = write_result {
            self.inner.pending.lock().unwrap().waiters.remove(&id);
            return Err(e.into());
        }

        match rx.recv() {
            Ok(Reply::Ok(value)) => {
                debug!(target: "rpc", "<- {method} #{id}");
                Ok(serde_json::from_value(value)?)
            }
            Ok(Reply::Failed(message)) => Err(Error::Rpc { method, message }),
            Ok(Reply::Closed) | Err(_) => Err(Error::ConnectionClosed),
        }
    }
}

fn read_loop(reader: BufReader<TcpStream>, inner: &Inner) {
    for line in reader.lines() {
        let line = match line {
            Ok(line) => line,
            Err(e) => {
                debug!(target: "rpc", "connection read error: {e}");
                break;
            }
        };
        if line.trim().is_empty() {
            continue;
        }

        let response: RpcResponse = match serde_json::from_str(&line) {
            Ok(r) => r,
            Err(e) => {
                warn!(target: "rpc", "skip malformed response: {e}");
                continue;
            }
        };

        let Some(waiter) = inner.pending.lock().unwrap().waiters.remove(&response.id) else {
            warn!(target: "rpc", "response for unknown request #{}", response.id);
            continue;
        };
        let reply = match response.error {
            None | Some(Value::Null) => Reply::Ok(response.result),
            Some(Value::String(msg)) => Reply::Failed(msg),
            Some(other) => Reply::Failed(other.to_string()),
        };
        _ = waiter.send(reply);
    }

    let mut pending = inner.pending.lock().unwrap();
    pending.closed = true;
    for (_, waiter) in pending.waiters.drain() {
        _ = waiter.send(Reply::Closed);
    }
    debug!(target: "rpc", "connection to {} closed", inner.addr);
}

impl Transport for RpcClient {
    fn create_breakpoint(&self, request: &Breakpoint) -> Result<Breakpoint, Error> {
        let out: CreateBreakpointOut = self.call(
            "CreateBreakpoint",
            CreateBreakpointIn {
                breakpoint: request,
            },
        )?;
        Ok(out.breakpoint)
    }

    fn clear_breakpoint(&self, id: i64) -> Result<(), Error> {
        let _: ClearBreakpointOut = self.call("ClearBreakpoint", ClearBreakpointIn { id })?;
        Ok(())
    }

    fn continue_execution(&self) -> Receiver<DebuggerState> {
        let (tx, rx) = mpsc::channel();
        let client = self.clone();

        let spawned = thread::Builder::new()
            .name("rpc-continue".to_string())
            .spawn(move || loop {
                let cmd = DebuggerCommand { name: "continue" };
                match client.call::<_, CommandOut>("Command", cmd) {
                    Ok(out) => {
                        let stopped = out.state.exited || !out.state.running;
                        if tx.send(out.state).is_err() || stopped {
                            return;
                        }
                    }
                    Err(e) => {
                        _ = tx.send(DebuggerState {
                            err: Some(e.to_string()),
                            ..Default::default()
                        });
                        return;
                    }
                }
            });
        // receiver sees a closed channel without states
        if let Err(e) = spawned {
            warn!(target: "rpc", "spawn continue task: {e}");
        }

        rx
    }

    fn next(&self) -> Result<DebuggerState, Error> {
        let out: CommandOut = self.call("Command", DebuggerCommand { name: "next" })?;
        Ok(out.state)
    }

    fn restart(&self) -> Result<(), Error> {
        let _: RestartOut = self.call("Restart", Empty {})?;
        Ok(())
    }

    fn process_pid(&self) -> Result<i32, Error> {
        let out: ProcessPidOut = self.call("ProcessPid", Empty {})?;
        Ok(out.pid)
    }

    fn list_goroutines(&self) -> Result<Vec<Goroutine>, Error> {
        let out: ListGoroutinesOut =
            self.call("ListGoroutines", ListGoroutinesIn { start: 0, count: 0 })?;
        Ok(out.goroutines)
    }

    fn get_state(&self) -> Result<DebuggerState, Error> {
        let out: StateOut = self.call("State", StateIn { non_blocking: true })?;
        Ok(out.state)
    }

    fn list_functions(&self, filter: &str) -> Result<Vec<String>, Error> {
        let out: ListFunctionsOut = self.call("ListFunctions", ListFunctionsIn { filter })?;
        Ok(out.funcs)
    }

    fn list_local_vars(&self, goroutine_id: i64) -> Result<Vec<Variable>, Error> {
        let out: ListLocalVarsOut = self.call(
            "ListLocalVars",
            ListLocalVarsIn {
                scope: EvalScope {
                    goroutine_id,
                    frame: 0,
                },
                cfg: LoadConfig::default(),
            },
        )?;
        Ok(out.variables)
    }

    fn list_breakpoints(&self) -> Result<Vec<Breakpoint>, Error> {
        let out: ListBreakpointsOut = self.call("ListBreakpoints", Empty {})?;
        Ok(out.breakpoints)
    }

    fn detach(&self, kill: bool) -> Result<(), Error> {
        let _: DetachOut = self.call("Detach", DetachIn { kill })?;
        Ok(())
    }

    fn close(&self) {
        let stream = self.inner.writer.lock().unwrap();
        if let Err(e) = stream.shutdown(Shutdown::Both) {
            debug!(target: "rpc", "shutdown connection: {e}");
        }
    }
}
