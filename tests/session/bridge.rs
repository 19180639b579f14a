use crate::common::{attach, stopped_at, thread_at, wait_for, MockTransport};
use dlvctl::error::Error;
use dlvctl::host::MarkerKind;
use dlvctl::session::bridge::{CommandBridge, TextSink};
use dlvctl::session::table::CommandTable;
use dlvctl::session::Phase;
use std::io;
use std::sync::mpsc;
use std::sync::{Arc, Weak};
use std::thread;

#[test]
fn test_send_command_appends_output() {
    let env = attach(MockTransport::stopped());

    let output = env.session.send_command("funcs main").unwrap();
    assert_eq!(
        String::from_utf8(output).unwrap(),
        "main.main\nmain.worker\n"
    );
    assert!(env.host.log_contains("(dlv) funcs main"));
    assert!(env.host.log_contains("main.worker"));
}

#[test]
fn test_send_unknown_command() {
    let env = attach(MockTransport::stopped());
    let before = env.host.log.lock().unwrap().len();

    let err = env.session.send_command("frobnicate 1").unwrap_err();
    assert!(matches!(err, Error::UnknownCommand(name) if name == "frobnicate"));
    assert_eq!(env.host.log.lock().unwrap().len(), before);
}

#[test]
fn test_prompt_command() {
    let env = attach(MockTransport::stopped());
    *env.host.prompt_answer.lock().unwrap() = "pid".to_string();

    let output = env.session.prompt_command().unwrap();
    assert_eq!(String::from_utf8(output).unwrap(), "100\n");

    *env.host.prompt_answer.lock().unwrap() = "  ".to_string();
    assert!(env.session.prompt_command().unwrap().is_empty());
}

#[test]
fn test_command_table() {
    let env = attach(MockTransport::stopped());

    struct TestCase {
        command: &'static str,
        expected: &'static str,
    }
    let cases = [
        TestCase {
            command: "locals",
            expected: "x = 42\n",
        },
        TestCase {
            command: "state",
            expected: "> F() /src/app/a.go:1 goroutine(3) (PC: 0)\n",
        },
        TestCase {
            command: "pid",
            expected: "100\n",
        },
    ];

    for tc in cases {
        let output = env.session.send_command(tc.command).unwrap();
        assert_eq!(String::from_utf8(output).unwrap(), tc.expected, "{}", tc.command);
    }

    assert!(matches!(
        env.session.send_command("clear x"),
        Err(Error::MalformedCommand(_))
    ));
    assert!(matches!(
        env.session.send_command("break"),
        Err(Error::MalformedCommand(_))
    ));
    let help = String::from_utf8(env.session.send_command("help").unwrap()).unwrap();
    assert!(help.contains("goroutines"));
}

#[test]
fn test_free_text_breakpoints_follow_session() {
    let env = attach(MockTransport::stopped());

    let output = env.session.send_command("b main.go:3").unwrap();
    assert!(output.is_empty());
    assert!(env.host.log_contains("Breakpoint 1 set at main.go:3"));
    assert_eq!(env.session.marked_breakpoints(), vec![1]);
    assert_eq!(env.host.live_markers(MarkerKind::Breakpoint).len(), 1);

    env.session.send_command("clear 1").unwrap();
    assert!(env.host.log_contains("Breakpoint 1 cleared"));
    assert!(env.session.breakpoints().is_empty());
    assert!(env.session.marked_breakpoints().is_empty());
    assert!(env.host.live_markers(MarkerKind::Breakpoint).is_empty());
    assert_eq!(env.transport.called("clear_breakpoint"), 1);

    assert!(matches!(
        env.session.send_command("clear 1"),
        Err(Error::BreakpointNotFound(1))
    ));
}

#[test]
fn test_free_text_execution_follows_session() {
    let env = attach(MockTransport::stopped());
    env.transport
        .script_continue(vec![stopped_at(thread_at(40, 0x4, None))]);

    env.session.send_command("continue").unwrap();
    assert_eq!(env.session.phase(), Phase::Stopped);
    assert_eq!(env.session.current_thread().map(|t| t.line), Some(40));
    assert!(env.host.log_contains("> F() ./a.go:40 (PC: 0x4)"));
    wait_for("current line marker", || {
        env.host
            .live_markers(MarkerKind::ProgramCounter)
            .first()
            .map(|m| m.line)
            == Some(40)
    });

    env.transport
        .script_next(Ok(stopped_at(thread_at(41, 0x5, None))));
    env.session.send_command("n").unwrap();
    assert_eq!(env.session.current_thread().map(|t| t.line), Some(41));
    assert!(env.host.log_contains("> F() ./a.go:41 goroutine(3) (PC: 5)"));

    env.session.send_command("restart").unwrap();
    assert_eq!(env.session.process_id(), Some(101));
    assert!(env.host.log_contains("Process restarted with PID 101"));
    wait_for("no current line marker", || env.session.pc_marker().is_none());
}

#[test]
fn test_free_text_continue_rejected_while_busy() {
    let env = attach(MockTransport::stopped());
    let (release, gate) = mpsc::channel();
    *env.transport.continue_gate.lock().unwrap() = Some(gate);
    env.transport
        .script_continue(vec![stopped_at(thread_at(10, 0x1, None))]);

    let session = env.session.clone();
    let cont = thread::spawn(move || session.continue_execution());
    wait_for("continue in flight", || {
        env.transport.called("continue_execution") == 1
    });

    assert!(matches!(
        env.session.send_command("continue"),
        Err(Error::Busy)
    ));
    assert_eq!(env.transport.called("continue_execution"), 1);

    release.send(()).unwrap();
    assert_eq!(cont.join().unwrap().unwrap(), Phase::Stopped);
}

#[test]
fn test_table_without_session() {
    let transport = Arc::new(MockTransport::stopped());
    let bridge = CommandBridge::new(
        Arc::new(CommandTable::new(transport.clone(), Weak::new())),
        Arc::new(TextSink::new(io::sink())),
    );

    assert_eq!(String::from_utf8(bridge.send("pid").unwrap()).unwrap(), "100\n");
    assert!(matches!(bridge.send("c"), Err(Error::SessionClosed)));
    assert_eq!(transport.called("continue_execution"), 0);
}

#[test]
fn test_concurrent_free_text_commands() {
    let env = attach(MockTransport::stopped());

    let handles: Vec<_> = (0..8)
        .map(|i| {
            let session = env.session.clone();
            thread::spawn(move || {
                let (cmd, expected) = if i % 2 == 0 {
                    ("funcs pkg", "pkg.handler\n")
                } else {
                    ("pid", "100\n")
                };
                let output = session.send_command(cmd).unwrap();
                assert_eq!(String::from_utf8(output).unwrap(), expected);
            })
        })
        .collect();

    for h in handles {
        h.join().unwrap();
    }
}
