//! End-to-end dispatcher tests over a real socket.
//!
//! Each test binds its own server in a temp directory and drives it with
//! plain `UnixStream` clients speaking the wire protocol, the same way the
//! front-end does.

use std::io::Read;
use std::os::unix::net::UnixStream;
use std::path::PathBuf;
use std::time::Duration;

use muxkit_protocol::{
    read_frame, read_raw_u32, read_text_reply, recv_fd, write_message, MsgType, WindowSize,
    PROTOCOL_VERSION,
};
use muxkit_server::Dispatcher;

struct TestServer {
    socket: PathBuf,
    _dir: tempfile::TempDir,
}

fn start_server() -> TestServer {
    // Deterministic shell for spawned panes.
    std::env::set_var("SHELL", "/bin/sh");

    let dir = tempfile::tempdir().unwrap();
    let socket = dir.path().join("default");
    let mut dispatcher = Dispatcher::bind(&socket).unwrap();
    std::thread::spawn(move || {
        let _ = dispatcher.run_loop();
    });
    TestServer { socket, _dir: dir }
}

fn connect(server: &TestServer) -> UnixStream {
    for _ in 0..50 {
        if let Ok(stream) = UnixStream::connect(&server.socket) {
            return stream;
        }
        std::thread::sleep(Duration::from_millis(20));
    }
    panic!("server never became reachable");
}

fn handshake(mut stream: &UnixStream) {
    write_message(
        &mut stream,
        MsgType::Version,
        &PROTOCOL_VERSION.to_ne_bytes(),
    )
    .unwrap();
    let version = read_raw_u32(&mut stream).unwrap().unwrap();
    assert_eq!(version, PROTOCOL_VERSION);
}

fn create_session(mut stream: &UnixStream) -> std::os::fd::OwnedFd {
    let ws = WindowSize { rows: 23, cols: 80 };
    write_message(&mut stream, MsgType::Resize, &ws.encode()).unwrap();
    write_message(&mut stream, MsgType::Command, b"new-session\0").unwrap();
    recv_fd(stream).unwrap()
}

fn list_sessions(server: &TestServer) -> String {
    let stream = connect(server);
    handshake(&stream);
    write_message(&mut &stream, MsgType::ListSessions, &[]).unwrap();
    read_text_reply(&mut &stream).unwrap()
}

fn read_until_eof(mut stream: &UnixStream) {
    let mut buf = [0u8; 64];
    loop {
        match stream.read(&mut buf) {
            Ok(0) => return,
            Ok(_) => continue,
            Err(_) => return,
        }
    }
}

#[test]
fn version_mismatch_replies_then_closes() {
    let server = start_server();
    let stream = connect(&server);

    write_message(&mut &stream, MsgType::Version, &7u32.to_ne_bytes()).unwrap();
    let version = read_raw_u32(&mut &stream).unwrap().unwrap();
    assert_eq!(version, PROTOCOL_VERSION);

    // The server closed the connection; no session was created.
    read_until_eof(&stream);
    assert_eq!(list_sessions(&server), "(no sessions)\n");
}

#[test]
fn new_session_hands_back_a_live_master() {
    let server = start_server();
    let stream = connect(&server);
    handshake(&stream);

    let master = create_session(&stream);
    assert!(nix::unistd::isatty(&master).unwrap_or(false));

    let listing = list_sessions(&server);
    assert!(
        listing.starts_with("0: attached (pid "),
        "unexpected listing: {listing:?}"
    );
}

#[test]
fn detach_then_attach_replays_masters_and_snapshots() {
    let server = start_server();

    // First front-end: create, snapshot, detach.
    let first = connect(&server);
    handshake(&first);
    let _master = create_session(&first);

    let mut snapshot = Vec::new();
    snapshot.extend_from_slice(&0u32.to_ne_bytes()); // pane id
    snapshot.extend_from_slice(b"grid-bytes");
    write_message(&mut &first, MsgType::GridSave, &snapshot).unwrap();
    write_message(&mut &first, MsgType::Detach, &[]).unwrap();

    // The server closes the detached connection on its next sweep.
    read_until_eof(&first);
    let listing = list_sessions(&server);
    assert!(listing.starts_with("0: detached (pid "));

    // Second front-end: attach to session 0.
    let second = connect(&server);
    handshake(&second);
    write_message(&mut &second, MsgType::Detach, &0u32.to_ne_bytes()).unwrap();

    let pane_count = read_raw_u32(&mut &second).unwrap().unwrap();
    assert_eq!(pane_count, 1);
    let master = recv_fd(&second).unwrap();
    assert!(nix::unistd::isatty(&master).unwrap_or(false));

    let snapshot_count = read_raw_u32(&mut &second).unwrap().unwrap();
    assert_eq!(snapshot_count, 1);
    let frame = read_frame(&mut &second).unwrap().unwrap();
    assert_eq!(frame.msg_type(), Some(MsgType::GridSave));
    assert_eq!(frame.payload, snapshot);

    // The session is attached again, and the snapshot cache was consumed:
    // a second detach/attach cycle reports no snapshots.
    assert!(list_sessions(&server).starts_with("0: attached (pid "));
    write_message(&mut &second, MsgType::Detach, &[]).unwrap();
    read_until_eof(&second);

    let third = connect(&server);
    handshake(&third);
    write_message(&mut &third, MsgType::Detach, &0u32.to_ne_bytes()).unwrap();
    assert_eq!(read_raw_u32(&mut &third).unwrap().unwrap(), 1);
    let _master = recv_fd(&third).unwrap();
    assert_eq!(read_raw_u32(&mut &third).unwrap().unwrap(), 0);
}

#[test]
fn attach_miss_reports_zero_panes() {
    let server = start_server();
    let stream = connect(&server);
    handshake(&stream);

    write_message(&mut &stream, MsgType::Detach, &99u32.to_ne_bytes()).unwrap();
    assert_eq!(read_raw_u32(&mut &stream).unwrap().unwrap(), 0);
}

#[test]
fn attaching_an_attached_session_fails() {
    let server = start_server();
    let holder = connect(&server);
    handshake(&holder);
    let _master = create_session(&holder);

    let intruder = connect(&server);
    handshake(&intruder);
    write_message(&mut &intruder, MsgType::Detach, &0u32.to_ne_bytes()).unwrap();
    assert_eq!(read_raw_u32(&mut &intruder).unwrap().unwrap(), 0);
}

#[test]
fn kill_removes_the_session_and_its_client() {
    let server = start_server();
    let holder = connect(&server);
    handshake(&holder);
    let _master = create_session(&holder);

    let killer = connect(&server);
    handshake(&killer);
    write_message(&mut &killer, MsgType::DetachKill, &0u32.to_ne_bytes()).unwrap();
    let reply = read_text_reply(&mut &killer).unwrap();
    assert_eq!(reply, "killed session 0\n");

    // The attached front-end's connection was closed along with the
    // session, and the session no longer lists.
    read_until_eof(&holder);
    assert_eq!(list_sessions(&server), "(no sessions)\n");
}

#[test]
fn killing_an_unknown_session_reports_not_found() {
    let server = start_server();
    let stream = connect(&server);
    handshake(&stream);
    write_message(&mut &stream, MsgType::DetachKill, &5u32.to_ne_bytes()).unwrap();
    assert_eq!(
        read_text_reply(&mut &stream).unwrap(),
        "session 5 not found\n"
    );
}

#[test]
fn dead_shell_tears_the_session_down() {
    let server = start_server();
    let stream = connect(&server);
    handshake(&stream);
    let _master = create_session(&stream);

    let listing = list_sessions(&server);
    let pid: i32 = listing
        .trim_end()
        .rsplit_once("pid ")
        .and_then(|(_, rest)| rest.trim_end_matches(')').parse().ok())
        .expect("pid in listing");

    nix::sys::signal::kill(
        nix::unistd::Pid::from_raw(pid),
        nix::sys::signal::Signal::SIGKILL,
    )
    .unwrap();

    // Reaping is driven by SIGCHLD; give the dispatcher a few sweeps.
    for _ in 0..100 {
        if list_sessions(&server) == "(no sessions)\n" {
            return;
        }
        std::thread::sleep(Duration::from_millis(50));
    }
    panic!("session was never torn down after its shell died");
}
