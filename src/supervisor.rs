//! Debugger server process supervision.
//!
//! [`Supervisor`] spawns a headless debugger server, collects its combined output and publishes
//! its exit status. The child is owned exclusively by the supervisor: a monitoring thread is the
//! only place where it is waited on.

use crate::config::Config;
use crate::error::Error;
use log::{debug, info, warn};
use nix::errno::Errno;
use nix::sys::signal::{kill, Signal};
use nix::unistd::Pid;
use std::fmt::{Display, Formatter};
use std::io::Read;
use std::os::unix::process::ExitStatusExt;
use std::path::{Path, PathBuf};
use std::process::{Command, ExitStatus, Stdio};
use std::sync::{Arc, Condvar, Mutex};
use std::thread;
use std::time::Duration;

const VCS_DIRS: [&str; 4] = [".git", ".hg", ".svn", ".bzr"];

/// Return the nearest directory (starting from `dir`) that contains a version control directory.
pub fn find_vcs_root(dir: &Path) -> Option<PathBuf> {
    dir.ancestors()
        .find(|d| VCS_DIRS.iter().any(|vcs| d.join(vcs).exists()))
        .map(Path::to_path_buf)
}

/// Resolve a package path for a debug target directory.
///
/// Target is lifted to a repository root, if root lies inside one of `gopath` workspaces
/// then a workspace relative import path is returned, otherwise the root itself.
pub fn package_path(target: &Path, gopath: Option<&str>) -> String {
    let root = find_vcs_root(target).unwrap_or_else(|| target.to_path_buf());

    let import_path = gopath.into_iter().flat_map(|p| p.split(':')).find_map(|ws| {
        if ws.is_empty() {
            return None;
        }
        let rel = root.strip_prefix(Path::new(ws).join("src")).ok()?;
        (!rel.as_os_str().is_empty()).then(|| rel.to_string_lossy().to_string())
    });

    import_path.unwrap_or_else(|| root.to_string_lossy().to_string())
}

/// Server command line.
#[derive(Debug, Clone, PartialEq)]
pub struct ServerSpec {
    pub program: PathBuf,
    pub args: Vec<String>,
    pub cwd: PathBuf,
}

impl ServerSpec {
    /// Command line of a headless debugger server that builds and debugs a `target` package.
    pub fn headless(config: &Config, target: &Path) -> Result<Self, Error> {
        if !target.is_dir() {
            return Err(Error::TargetNotFound(target.to_path_buf()));
        }
        let program = if config.dlv.exists() {
            config.dlv.clone()
        } else {
            which::which(&config.dlv)
                .map_err(|_| Error::BinaryNotFound(config.dlv.to_string_lossy().to_string()))?
        };

        let gopath = std::env::var("GOPATH").ok();
        let pkg = package_path(target, gopath.as_deref());

        let mut args = vec![
            "debug".to_string(),
            "--headless".to_string(),
            "--api-version=2".to_string(),
            format!("--listen={}", config.listen),
        ];
        args.extend(config.build_flags.iter().cloned());
        args.push(pkg);

        Ok(Self {
            program,
            args,
            cwd: target.to_path_buf(),
        })
    }
}

/// How a server process ends.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExitInfo {
    pub code: Option<i32>,
    pub signal: Option<i32>,
}

impl ExitInfo {
    pub fn success(&self) -> bool {
        self.code == Some(0)
    }
}

impl From<ExitStatus> for ExitInfo {
    fn from(status: ExitStatus) -> Self {
        Self {
            code: status.code(),
            signal: status.signal(),
        }
    }
}

impl Display for ExitInfo {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match (self.code, self.signal) {
            (Some(code), _) => write!(f, "exit code {code}"),
            (None, Some(sig)) => write!(f, "killed by signal {sig}"),
            (None, None) => f.write_str("unknown exit status"),
        }
    }
}

type ExitSlot = Arc<(Mutex<Option<ExitInfo>>, Condvar)>;

/// Handle of a running (or already finished) server process.
#[derive(Clone)]
pub struct ServerHandle {
    pid: Pid,
    output: Arc<Mutex<Vec<u8>>>,
    exit: ExitSlot,
}

impl ServerHandle {
    pub fn pid(&self) -> Pid {
        self.pid
    }

    /// Combined stdout and stderr of a server collected so far.
    pub fn output(&self) -> String {
        String::from_utf8_lossy(&self.output.lock().unwrap()).to_string()
    }

    /// Return exit information if a server already exited.
    pub fn try_exit(&self) -> Option<ExitInfo> {
        *self.exit.0.lock().unwrap()
    }

    /// Block until a server exits.
    pub fn wait(&self) -> ExitInfo {
        let (lock, cvar) = &*self.exit;
        let mut exit = lock.lock().unwrap();
        loop {
            if let Some(info) = *exit {
                return info;
            }
            exit = cvar.wait(exit).unwrap();
        }
    }

    /// Block until a server exits or a timeout elapsed.
    pub fn wait_timeout(&self, timeout: Duration) -> Option<ExitInfo> {
        let (lock, cvar) = &*self.exit;
        let guard = lock.lock().unwrap();
        let (exit, _) = cvar
            .wait_timeout_while(guard, timeout, |exit| exit.is_none())
            .unwrap();
        *exit
    }

    /// Send a termination signal. Calling this on an already exited process is not an error.
    pub fn terminate(&self) -> Result<(), Error> {
        if self.try_exit().is_some() {
            return Ok(());
        }
        match kill(self.pid, Signal::SIGTERM) {
            Ok(()) | Err(Errno::ESRCH) => Ok(()),
            Err(e) => Err(Error::Syscall("kill", e)),
        }
    }
}

/// Spawns debugger servers.
pub struct Supervisor;

impl Supervisor {
    /// Start a headless server for a `target` package directory.
    pub fn start(config: &Config, target: &Path) -> Result<ServerHandle, Error> {
        let spec = ServerSpec::headless(config, target)?;
        Self::spawn(&spec)
    }

    /// Spawn a server process by its command line.
    pub fn spawn(spec: &ServerSpec) -> Result<ServerHandle, Error> {
        let (mut reader, writer) = os_pipe::pipe().map_err(Error::Spawn)?;
        let err_writer = writer.try_clone().map_err(Error::Spawn)?;

        let mut cmd = Command::new(&spec.program);
        cmd.args(&spec.args)
            .current_dir(&spec.cwd)
            .stdin(Stdio::null())
            .stdout(writer)
            .stderr(err_writer);
        let mut child = cmd.spawn().map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                Error::BinaryNotFound(spec.program.to_string_lossy().to_string())
            } else {
                Error::Spawn(e)
            }
        })?;
        // release parent copies of pipe writers, otherwise reader never sees EOF
        drop(cmd);

        let pid = Pid::from_raw(child.id() as i32);
        info!(target: "supervisor", "debugger server started, pid {pid}: {} {}", spec.program.display(), spec.args.join(" "));

        let output = Arc::new(Mutex::new(Vec::new()));
        let exit: ExitSlot = Arc::new((Mutex::new(None), Condvar::new()));

        let collector = {
            let output = Arc::clone(&output);
            thread::Builder::new()
                .name("server-output".to_string())
                .spawn(move || {
                    let mut buf = [0u8; 4096];
                    loop {
                        match reader.read(&mut buf) {
                            Ok(0) => break,
                            Ok(n) => output.lock().unwrap().extend_from_slice(&buf[..n]),
                            Err(e) => {
                                debug!(target: "supervisor", "server output read error: {e}");
                                break;
                            }
                        }
                    }
                })
        };

        let monitor = {
            let exit = Arc::clone(&exit);
            thread::Builder::new()
                .name("server-monitor".to_string())
                .spawn(move || {
                    let info = match child.wait() {
                        Ok(status) => ExitInfo::from(status),
                        Err(e) => {
                            warn!(target: "supervisor", "wait debugger server: {e}");
                            ExitInfo {
                                code: None,
                                signal: None,
                            }
                        }
                    };
                    info!(target: "supervisor", "debugger server {pid} finished: {info}");
                    let (lock, cvar) = &*exit;
                    *lock.lock().unwrap() = Some(info);
                    cvar.notify_all();
                })
        };

        let handle = ServerHandle { pid, output, exit };
        if let Err(e) = collector.and(monitor) {
            _ = kill(pid, Signal::SIGKILL);
            return Err(Error::Spawn(e));
        }
        Ok(handle)
    }
}
