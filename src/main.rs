use anyhow::Context;
use clap::Parser;
use dlvctl::command::SessionCommand;
use dlvctl::config::Config;
use dlvctl::host::console::ConsoleHost;
use dlvctl::host::logger::SessionLogger;
use dlvctl::log::LOGGER_SWITCHER;
use dlvctl::session::Session;
use log::{error, info};
use rustyline::error::ReadlineError;
use std::path::PathBuf;
use std::sync::Arc;

const PROMPT: &str = "(dlvctl) ";

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Directory of a Go package to debug
    #[arg(default_value = ".")]
    target: PathBuf,

    /// Address of a headless debugger server
    #[arg(long, env = "DLVCTL_LISTEN")]
    listen: Option<String>,

    /// Debugger server binary
    #[arg(long, env = "DLVCTL_DLV")]
    dlv: Option<PathBuf>,

    /// Configuration file (default: ~/.config/dlvctl/config.toml)
    #[arg(long)]
    config: Option<PathBuf>,
}

fn main() -> anyhow::Result<()> {
    let logger = env_logger::Logger::from_default_env();
    let filter = logger.filter();
    LOGGER_SWITCHER.switch(logger, filter);

    let args = Args::parse();
    let mut config = Config::load(args.config.as_deref())?;
    if let Some(listen) = args.listen {
        config.listen = listen;
    }
    if let Some(dlv) = args.dlv {
        config.dlv = dlv;
    }

    let target = args
        .target
        .canonicalize()
        .with_context(|| format!("resolve target {}", args.target.display()))?;

    let host = Arc::new(ConsoleHost::new(target.clone()));
    let session = Session::launch(&config, &target, host.clone(), host.clone())
        .context("start debug session")?;

    // from now on warnings go to the session log
    let logger = SessionLogger::new(host.clone());
    let filter = logger.filter();
    LOGGER_SWITCHER.switch(logger, filter);

    let mut editor = rustyline::DefaultEditor::new()?;
    loop {
        match editor.readline(PROMPT) {
            Ok(line) => {
                let line = line.trim();
                if line.is_empty() {
                    continue;
                }
                _ = editor.add_history_entry(line);

                match SessionCommand::parse(line) {
                    SessionCommand::Quit => break,
                    // prompt reads stdin itself, do not race with the main loop
                    SessionCommand::Prompt => {
                        if let Err(e) = session.prompt_command() {
                            error!(target: "dlvctl", "{e:#}");
                        }
                    }
                    cmd => {
                        session.dispatch(cmd);
                    }
                }
            }
            Err(ReadlineError::Interrupted | ReadlineError::Eof) => break,
            Err(e) => {
                error!(target: "dlvctl", "read command: {e}");
                break;
            }
        }
    }

    info!(target: "dlvctl", "close session");
    session.close(config.shutdown_timeout())?;
    if let Some(output) = session.server_output() {
        log::debug!(target: "supervisor", "server output:\n{output}");
    }
    Ok(())
}
