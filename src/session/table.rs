//! Internal debugger command table, the dispatcher behind a free-text command bridge.
//!
//! Commands that change breakpoints or move the debugee run through the owning [`Session`],
//! so they share its command slot, state and markers. Their results go to the session log.
//! Other commands query a server directly and write into the output sink.

use super::bridge::{CommandDispatcher, TextSink};
use super::Session;
use crate::error::Error;
use crate::rpc::{DebuggerState, Transport};
use std::sync::{Arc, Weak};

type Handler = fn(&CommandTable, &str, &TextSink) -> Result<(), Error>;

struct CommandEntry {
    aliases: &'static [&'static str],
    usage: &'static str,
    handler: Handler,
}

pub struct CommandTable {
    transport: Arc<dyn Transport>,
    session: Weak<Session>,
    commands: Vec<CommandEntry>,
}

impl CommandTable {
    pub fn new(transport: Arc<dyn Transport>, session: Weak<Session>) -> Self {
        let commands = vec![
            CommandEntry {
                aliases: &["break", "b"],
                usage: "break <file:line|function>  set a breakpoint",
                handler: Self::set_breakpoint,
            },
            CommandEntry {
                aliases: &["clear"],
                usage: "clear <id>                  delete a breakpoint",
                handler: Self::clear_breakpoint,
            },
            CommandEntry {
                aliases: &["breakpoints", "bp"],
                usage: "breakpoints                 list breakpoints",
                handler: Self::breakpoints,
            },
            CommandEntry {
                aliases: &["continue", "c"],
                usage: "continue                    run until breakpoint or exit",
                handler: Self::continue_execution,
            },
            CommandEntry {
                aliases: &["next", "n"],
                usage: "next                        step over to next source line",
                handler: Self::next,
            },
            CommandEntry {
                aliases: &["restart", "r"],
                usage: "restart                     restart process",
                handler: Self::restart,
            },
            CommandEntry {
                aliases: &["state"],
                usage: "state                       print execution state",
                handler: Self::state,
            },
            CommandEntry {
                aliases: &["goroutines", "grs"],
                usage: "goroutines                  list goroutines",
                handler: Self::goroutines,
            },
            CommandEntry {
                aliases: &["locals"],
                usage: "locals                      print local variables",
                handler: Self::locals,
            },
            CommandEntry {
                aliases: &["funcs"],
                usage: "funcs [regexp]              list functions",
                handler: Self::functions,
            },
            CommandEntry {
                aliases: &["pid"],
                usage: "pid                         print process id",
                handler: Self::pid,
            },
            CommandEntry {
                aliases: &["help", "h"],
                usage: "help                        print this help",
                handler: Self::help,
            },
        ];
        Self {
            transport,
            session,
            commands,
        }
    }

    fn session(&self) -> Result<Arc<Session>, Error> {
        self.session.upgrade().ok_or(Error::SessionClosed)
    }

    fn set_breakpoint(&self, args: &str, _: &TextSink) -> Result<(), Error> {
        let args: Vec<String> = args.split_whitespace().map(ToString::to_string).collect();
        if args.is_empty() {
            return Err(Error::MalformedCommand("break requires a location".to_string()));
        }
        self.session()?.create_breakpoint(&args)?;
        Ok(())
    }

    fn clear_breakpoint(&self, args: &str, _: &TextSink) -> Result<(), Error> {
        let id: i64 = args
            .parse()
            .map_err(|_| Error::MalformedCommand(format!("invalid breakpoint id `{args}`")))?;
        self.session()?.delete_breakpoint(id)?;
        Ok(())
    }

    fn breakpoints(&self, _: &str, out: &TextSink) -> Result<(), Error> {
        for bp in self.transport.list_breakpoints()? {
            out.writeln(format!(
                "Breakpoint {} at {}() {}:{} (hits total:{})",
                bp.id,
                bp.function_name.unwrap_or_default(),
                bp.file,
                bp.line,
                bp.total_hit_count
            ))?;
        }
        Ok(())
    }

    fn write_state(out: &TextSink, state: &DebuggerState) -> Result<(), Error> {
        if state.exited {
            out.writeln(format!("Process has exited with status {}", state.exit_status))?;
            return Ok(());
        }
        if let Some(err) = &state.err {
            out.writeln(format!("Command failed: {err}"))?;
        }
        match &state.current_thread {
            Some(t) => out.writeln(format!(
                "> {}() {}:{} goroutine({}) (PC: {})",
                t.function_name(),
                t.file,
                t.line,
                t.goroutine_id,
                t.pc
            ))?,
            None if state.running => out.writeln("running")?,
            None => out.writeln("stopped")?,
        }
        Ok(())
    }

    fn continue_execution(&self, _: &str, _: &TextSink) -> Result<(), Error> {
        self.session()?.continue_execution()?;
        Ok(())
    }

    fn next(&self, _: &str, _: &TextSink) -> Result<(), Error> {
        self.session()?.step()?;
        Ok(())
    }

    fn restart(&self, _: &str, _: &TextSink) -> Result<(), Error> {
        self.session()?.restart()?;
        Ok(())
    }

    fn state(&self, _: &str, out: &TextSink) -> Result<(), Error> {
        Self::write_state(out, &self.transport.get_state()?)
    }

    fn goroutines(&self, _: &str, out: &TextSink) -> Result<(), Error> {
        let goroutines = self.transport.list_goroutines()?;
        out.writeln(format!("[{} goroutines]", goroutines.len()))?;
        for g in goroutines {
            let loc = &g.user_current_loc;
            out.writeln(format!(
                "  Goroutine {} - {}() {}:{}",
                g.id,
                loc.function.as_ref().map(|f| f.name.as_str()).unwrap_or_default(),
                loc.file,
                loc.line
            ))?;
        }
        Ok(())
    }

    fn locals(&self, _: &str, out: &TextSink) -> Result<(), Error> {
        let state = self.transport.get_state()?;
        let goroutine = state
            .current_thread
            .map(|t| t.goroutine_id)
            .ok_or_else(|| Error::MalformedCommand("no current goroutine".to_string()))?;
        let vars = self.transport.list_local_vars(goroutine)?;
        if vars.is_empty() {
            out.writeln("(no locals)")?;
        }
        for var in vars {
            out.writeln(format!("{} = {}", var.name, var.value))?;
        }
        Ok(())
    }

    fn functions(&self, args: &str, out: &TextSink) -> Result<(), Error> {
        for func in self.transport.list_functions(args)? {
            out.writeln(func)?;
        }
        Ok(())
    }

    fn pid(&self, _: &str, out: &TextSink) -> Result<(), Error> {
        out.writeln(self.transport.process_pid()?)?;
        Ok(())
    }

    fn help(&self, _: &str, out: &TextSink) -> Result<(), Error> {
        out.writeln("The following commands are available:")?;
        for cmd in &self.commands {
            out.writeln(format!("    {} (alias: {})", cmd.usage, cmd.aliases.join("|")))?;
        }
        Ok(())
    }
}

impl CommandDispatcher for CommandTable {
    fn dispatch(&self, name: &str, args: &str, out: &TextSink) -> Result<(), Error> {
        let cmd = self
            .commands
            .iter()
            .find(|c| c.aliases.contains(&name))
            .ok_or_else(|| Error::UnknownCommand(name.to_string()))?;
        (cmd.handler)(self, args, out)
    }
}
