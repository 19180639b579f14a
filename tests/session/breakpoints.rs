use crate::common::{attach, MockTransport, CWD};
use dlvctl::error::Error;
use dlvctl::host::MarkerKind;
use dlvctl::session::Phase;
use std::sync::atomic::Ordering;

#[test]
fn test_create_breakpoint_at_cursor() {
    let env = attach(MockTransport::stopped());
    *env.host.editor_cursor.lock().unwrap() = Some(("main.go".to_string(), 10));

    let bp = env.session.create_breakpoint(&[]).unwrap();
    assert_eq!(bp.file, "main.go");
    assert_eq!(bp.line, 10);
    assert_eq!(bp.name, None);

    let requests = env.transport.create_requests.lock().unwrap();
    assert_eq!(requests[0].file, "main.go");
    assert_eq!(requests[0].line, 10);
    assert_eq!(requests[0].function_name, None);

    assert_eq!(env.session.breakpoints(), vec![bp.clone()]);
    assert_eq!(env.session.marked_breakpoints(), vec![bp.id]);
    let markers = env.host.live_markers(MarkerKind::Breakpoint);
    assert_eq!(markers.len(), 1);
    assert_eq!((markers[0].file.as_str(), markers[0].line), ("main.go", 10));
    assert!(env.host.log_contains("Breakpoint 1 set at main.go:10"));
}

#[test]
fn test_create_breakpoint_by_function_name() {
    let env = attach(MockTransport::stopped());

    let bp = env
        .session
        .create_breakpoint(&["pkg.handler".to_string()])
        .unwrap();
    assert_eq!(bp.name.as_deref(), Some("pkgHandler"));
    assert_eq!(bp.function_name.as_deref(), Some("pkg.handler"));

    // display name never goes to a server
    let requests = env.transport.create_requests.lock().unwrap();
    assert_eq!(requests[0].function_name.as_deref(), Some("pkg.handler"));
    assert_eq!(requests[0].name, None);

    assert!(env
        .host
        .log_contains("Breakpoint 1 (pkgHandler) set at ./handler.go:5"));
    assert!(env.session.breakpoints()[0].file.starts_with(CWD));
}

#[test]
fn test_create_breakpoint_by_file_line() {
    let env = attach(MockTransport::running());
    assert_eq!(env.session.phase(), Phase::Running);

    let bp = env
        .session
        .create_breakpoint(&[format!("{CWD}/a.go:42")])
        .unwrap();
    assert_eq!(bp.line, 42);
    assert!(env.host.log_contains("Breakpoint 1 set at ./a.go:42"));
}

#[test]
fn test_create_breakpoint_rejects_bad_arguments() {
    let env = attach(MockTransport::stopped());

    let err = env
        .session
        .create_breakpoint(&["a".to_string(), "b".to_string()])
        .unwrap_err();
    assert!(matches!(err, Error::TooManyArguments));

    // no cursor in editor
    let err = env.session.create_breakpoint(&[]).unwrap_err();
    assert!(matches!(err, Error::Host(_)));

    assert_eq!(env.transport.called("create_breakpoint"), 0);
    assert!(env.session.breakpoints().is_empty());
    assert!(env.host.live_markers(MarkerKind::Breakpoint).is_empty());
}

#[test]
fn test_delete_breakpoint() {
    let env = attach(MockTransport::stopped());
    let bp1 = env.session.create_breakpoint(&["main.main".to_string()]).unwrap();
    let bp2 = env.session.create_breakpoint(&["main.go:3".to_string()]).unwrap();

    let deleted = env.session.delete_breakpoint(bp1.id).unwrap();
    assert_eq!(deleted.id, bp1.id);
    assert_eq!(env.session.breakpoints(), vec![bp2.clone()]);
    assert_eq!(env.session.marked_breakpoints(), vec![bp2.id]);
    assert_eq!(env.host.live_markers(MarkerKind::Breakpoint).len(), 1);
    assert_eq!(env.transport.called("clear_breakpoint"), 1);
    assert!(env.host.log_contains("Breakpoint 1 cleared"));
}

#[test]
fn test_delete_unknown_breakpoint() {
    let env = attach(MockTransport::stopped());
    let bp = env.session.create_breakpoint(&["main.main".to_string()]).unwrap();

    let err = env.session.delete_breakpoint(bp.id + 100).unwrap_err();
    assert!(matches!(err, Error::BreakpointNotFound(id) if id == bp.id + 100));
    assert_eq!(env.session.breakpoints().len(), 1);
    assert_eq!(env.session.marked_breakpoints(), vec![bp.id]);
    assert_eq!(env.transport.called("clear_breakpoint"), 0);
}

#[test]
fn test_delete_breakpoint_server_failure() {
    let env = attach(MockTransport::stopped());
    let bp = env.session.create_breakpoint(&["main.main".to_string()]).unwrap();
    env.transport.fail_clear.store(true, Ordering::SeqCst);

    env.session.delete_breakpoint(bp.id).unwrap();
    assert!(env.session.breakpoints().is_empty());
    assert!(env.session.marked_breakpoints().is_empty());
    assert!(env.host.live_markers(MarkerKind::Breakpoint).is_empty());
    assert!(env
        .host
        .log
        .lock()
        .unwrap()
        .iter()
        .any(|l| l.starts_with("Breakpoint 1 cleared locally")));
    assert_eq!(env.session.phase(), Phase::Stopped);
}

#[test]
fn test_attach_adopts_user_breakpoints() {
    let transport = MockTransport::stopped();
    *transport.server_breakpoints.lock().unwrap() = vec![
        dlvctl::rpc::Breakpoint {
            id: -1,
            function_name: Some("runtime.fatalpanic".to_string()),
            ..Default::default()
        },
        dlvctl::rpc::Breakpoint {
            id: 4,
            file: format!("{CWD}/a.go"),
            line: 7,
            ..Default::default()
        },
    ];
    let env = attach(transport);

    assert_eq!(env.session.marked_breakpoints(), vec![4]);
    assert_eq!(env.session.breakpoints().len(), 1);
}
