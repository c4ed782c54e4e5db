//! The dispatcher: accept loop and per-connection message handling.
//!
//! Single-threaded and cooperative. The only blocking point is one
//! `poll(2)` over the listen socket, every connected front-end, and the
//! signal self-pipe; every handler runs to completion between wakes.
//! Within one connection messages are processed strictly in arrival order,
//! and a multi-phase operation like attach is written back as one
//! uninterruptible sequence.

use std::io::Write;
use std::os::fd::{AsFd, AsRawFd};
use std::os::unix::net::{UnixListener, UnixStream};
use std::path::Path;

use nix::poll::{poll, PollFd, PollFlags, PollTimeout};
use nix::sys::signal::{signal, SigHandler, Signal};
use tracing::{debug, info, warn};

use muxkit_protocol::{
    paths, read_frame, send_fd, write_message, write_raw_u32, write_text_reply, Frame, MsgType,
    SignalWakeup, WindowSize, LISTEN_BACKLOG, MAX_CLIENTS, PROTOCOL_VERSION,
};

use crate::error::ServerError;
use crate::session::Session;
use crate::spawn;

/// What to do with a connection after handling one message.
#[derive(PartialEq)]
enum Disposition {
    Keep,
    Close,
}

enum Token {
    Signal,
    Listener,
    Conn(usize),
}

pub struct Dispatcher {
    listener: UnixListener,
    wakeup: SignalWakeup,
    clients: Vec<Option<UnixStream>>,
    sessions: Vec<Session>,
}

/// Binds the per-user socket and runs the dispatcher until the process is
/// killed. The caller has already daemonized; this detaches from any
/// controlling terminal and never returns on the success path.
pub fn run() -> Result<(), ServerError> {
    let dir = paths::ensure_runtime_dir()?;
    let socket = paths::socket_path();
    info!(dir = %dir.display(), "server starting");

    // A front-end vanishing mid-write must surface as EPIPE, not kill the
    // whole server.
    unsafe {
        let _ = signal(Signal::SIGPIPE, SigHandler::SigIgn);
    }
    let _ = nix::unistd::setsid();

    let mut dispatcher = Dispatcher::bind(&socket)?;
    dispatcher.run_loop()
}

impl Dispatcher {
    /// Binds the listen socket with the protocol's small backlog.
    pub fn bind(socket: &Path) -> Result<Dispatcher, ServerError> {
        use nix::sys::socket::{
            bind, listen, socket as new_socket, AddressFamily, Backlog, SockFlag, SockType,
            UnixAddr,
        };

        let fd = new_socket(
            AddressFamily::Unix,
            SockType::Stream,
            SockFlag::SOCK_CLOEXEC,
            None,
        )?;
        let addr = UnixAddr::new(socket)?;
        bind(fd.as_raw_fd(), &addr)?;
        listen(&fd, Backlog::new(LISTEN_BACKLOG as i32)?)?;
        info!(socket = %socket.display(), "listening");

        let mut wakeup = SignalWakeup::new()?;
        wakeup.watch(signal_hook::consts::SIGCHLD)?;

        Ok(Dispatcher {
            listener: UnixListener::from(fd),
            wakeup,
            clients: Vec::new(),
            sessions: Vec::new(),
        })
    }

    pub fn run_loop(&mut self) -> Result<(), ServerError> {
        loop {
            self.run_once()?;
        }
    }

    /// One iteration: wait, handle readiness, sweep detach requests, reap.
    pub fn run_once(&mut self) -> Result<(), ServerError> {
        let mut ready = Vec::new();
        {
            let mut fds = Vec::new();
            let mut tokens = Vec::new();
            fds.push(PollFd::new(self.wakeup.poll_fd(), PollFlags::POLLIN));
            tokens.push(Token::Signal);
            fds.push(PollFd::new(self.listener.as_fd(), PollFlags::POLLIN));
            tokens.push(Token::Listener);
            for (i, conn) in self.clients.iter().enumerate() {
                if let Some(stream) = conn {
                    fds.push(PollFd::new(stream.as_fd(), PollFlags::POLLIN));
                    tokens.push(Token::Conn(i));
                }
            }

            match poll(&mut fds, PollTimeout::NONE) {
                Ok(_) => {
                    for (fd, token) in fds.iter().zip(tokens) {
                        let revents = fd.revents().unwrap_or(PollFlags::empty());
                        if revents
                            .intersects(PollFlags::POLLIN | PollFlags::POLLHUP | PollFlags::POLLERR)
                        {
                            ready.push(token);
                        }
                    }
                }
                // Interrupted by a signal: fall through to the flag checks.
                Err(nix::errno::Errno::EINTR) => {}
                Err(e) => return Err(ServerError::Sys(e)),
            }
        }

        for token in ready {
            match token {
                Token::Signal => self.wakeup.drain(),
                Token::Listener => self.accept_one(),
                Token::Conn(i) => {
                    if self.clients[i].is_some()
                        && self.handle_client(i) == Disposition::Close
                    {
                        self.close_conn(i);
                    }
                }
            }
        }

        // Sessions marked detached this iteration lose their connection;
        // masters and children stay alive.
        let mut to_close = Vec::new();
        for sess in &self.sessions {
            if sess.detached {
                if let Some(conn) = sess.client {
                    info!(session = sess.id, "session detached, shell continues");
                    to_close.push(conn);
                }
            }
        }
        for conn in to_close {
            self.close_conn(conn);
        }

        if self.wakeup.take(signal_hook::consts::SIGCHLD) {
            self.reap_children();
        }
        Ok(())
    }

    fn accept_one(&mut self) {
        let stream = match self.listener.accept() {
            Ok((stream, _)) => stream,
            Err(e) => {
                warn!(error = %e, "accept failed");
                return;
            }
        };
        let live = self.clients.iter().flatten().count();
        if live >= MAX_CLIENTS {
            warn!("client limit reached, refusing connection");
            return;
        }
        match self.clients.iter_mut().position(|c| c.is_none()) {
            Some(slot) => self.clients[slot] = Some(stream),
            None => self.clients.push(Some(stream)),
        }
    }

    /// Drops the connection and unbinds any session pointing at it. The
    /// session itself survives; whether it is attachable depends on its
    /// detached flag, exactly as it was left.
    fn close_conn(&mut self, idx: usize) {
        if self.clients[idx].take().is_some() {
            debug!(conn = idx, "connection closed");
        }
        for sess in &mut self.sessions {
            if sess.client == Some(idx) {
                sess.client = None;
            }
        }
    }

    /// Session bound to this connection, created on first use.
    fn ensure_session(&mut self, conn: usize) -> usize {
        if let Some(pos) = self.sessions.iter().position(|s| s.client == Some(conn)) {
            return pos;
        }
        let id = Session::next_id(&self.sessions);
        debug!(session = id, conn, "created session");
        self.sessions.push(Session::new(id, conn));
        self.sessions.len() - 1
    }

    /// Reads and dispatches exactly one framed message from `idx`.
    fn handle_client(&mut self, idx: usize) -> Disposition {
        let frame = {
            let stream = self.clients[idx].as_ref().expect("checked live");
            read_frame(&mut (&*stream))
        };
        let frame = match frame {
            Ok(Some(frame)) => frame,
            Ok(None) => return Disposition::Close,
            Err(e) => {
                warn!(conn = idx, error = %e, "dropping connection");
                return Disposition::Close;
            }
        };

        match frame.msg_type() {
            Some(MsgType::Version) => self.handle_version(idx, &frame),
            Some(MsgType::ListSessions) => self.handle_list_sessions(idx),
            Some(MsgType::DetachKill) => self.handle_kill(idx, &frame),
            Some(kind) => {
                let session = self.ensure_session(idx);
                match kind {
                    MsgType::Command => self.handle_command(idx, session, &frame),
                    MsgType::Resize => {
                        if let Some(ws) = WindowSize::decode(&frame.payload) {
                            self.sessions[session].window_size = ws;
                        }
                        Disposition::Keep
                    }
                    MsgType::Detach if frame.payload.is_empty() => {
                        self.sessions[session].detached = true;
                        Disposition::Keep
                    }
                    MsgType::Detach => self.handle_attach(idx, &frame),
                    MsgType::GridSave => {
                        self.handle_grid_save(session, frame);
                        Disposition::Keep
                    }
                    MsgType::Exited => {
                        info!(conn = idx, "front-end exited");
                        Disposition::Close
                    }
                    MsgType::Version | MsgType::ListSessions | MsgType::DetachKill => {
                        unreachable!("administrative kinds handled above")
                    }
                }
            }
            None => {
                warn!(kind = frame.kind, "unknown message kind ignored");
                Disposition::Keep
            }
        }
    }

    fn handle_version(&mut self, idx: usize, frame: &Frame) -> Disposition {
        let theirs = match frame.payload.get(..4) {
            Some(raw) => u32::from_ne_bytes(raw.try_into().expect("4 bytes")),
            None => return Disposition::Close,
        };
        let stream = self.clients[idx].as_ref().expect("checked live");
        if write_raw_u32(&mut (&*stream), PROTOCOL_VERSION).is_err() {
            return Disposition::Close;
        }
        if theirs != PROTOCOL_VERSION {
            warn!(theirs, ours = PROTOCOL_VERSION, "protocol version mismatch");
            return Disposition::Close;
        }
        Disposition::Keep
    }

    fn handle_list_sessions(&mut self, idx: usize) -> Disposition {
        let mut text = String::new();
        for sess in &self.sessions {
            if let Some(pid) = sess.display_pid() {
                let state = if sess.detached { "detached" } else { "attached" };
                text.push_str(&format!("{}: {} (pid {})\n", sess.id, state, pid));
            }
        }
        if text.is_empty() {
            text.push_str("(no sessions)\n");
        }
        let stream = self.clients[idx].as_ref().expect("checked live");
        if let Err(e) = write_text_reply(&mut (&*stream), &text) {
            warn!(error = %e, "list reply failed");
        }
        Disposition::Close
    }

    fn handle_kill(&mut self, idx: usize, frame: &Frame) -> Disposition {
        let Some(raw) = frame.payload.get(..4) else {
            return Disposition::Close;
        };
        let id = u32::from_ne_bytes(raw.try_into().expect("4 bytes"));

        let reply = match self
            .sessions
            .iter()
            .position(|s| s.id == id && s.pane_count() > 0)
        {
            Some(pos) => {
                info!(session = id, "killing session");
                let mut sess = self.sessions.remove(pos);
                for slot in sess.panes_mut() {
                    if let Some(pane) = slot {
                        if let Err(e) = pane.child.kill() {
                            warn!(pid = pane.pid, error = %e, "kill failed");
                        }
                    }
                }
                if let Some(conn) = sess.client {
                    self.close_conn(conn);
                }
                // Dropping the session closes every master.
                format!("killed session {id}\n")
            }
            None => {
                warn!(session = id, "kill: session not found");
                format!("session {id} not found\n")
            }
        };

        // The killed session may have been bound to this very connection,
        // in which case the reply has nowhere to go.
        let Some(stream) = self.clients[idx].as_ref() else {
            return Disposition::Close;
        };
        if let Err(e) = write_text_reply(&mut (&*stream), &reply) {
            warn!(error = %e, "kill reply failed");
        }
        Disposition::Close
    }

    /// `new-session` and `pane-split` both add one pane to the
    /// connection's session: open a PTY, pass the master to the front-end,
    /// then spawn the shell on the slave.
    fn handle_command(&mut self, idx: usize, session: usize, frame: &Frame) -> Disposition {
        let command = match std::str::from_utf8(
            frame.payload.strip_suffix(&[0]).unwrap_or(&frame.payload),
        ) {
            Ok(cmd) => cmd,
            Err(_) => {
                warn!("command payload is not text");
                return Disposition::Keep;
            }
        };
        if command != muxkit_protocol::CMD_NEW_SESSION && command != muxkit_protocol::CMD_PANE_SPLIT
        {
            warn!(command, "unknown command ignored");
            return Disposition::Keep;
        }
        if !self.sessions[session].can_add_pane() {
            warn!(session = self.sessions[session].id, "max panes reached");
            return Disposition::Keep;
        }

        let pane = match spawn::spawn_shell(self.sessions[session].window_size) {
            Ok(pane) => pane,
            Err(e) => {
                warn!(error = %e, "pane creation failed, request dropped");
                return Disposition::Keep;
            }
        };

        let stream = self.clients[idx].as_ref().expect("checked live");
        if let Err(e) = send_fd(stream, pane.master_fd.as_fd()) {
            warn!(error = %e, "master transfer failed");
            return Disposition::Close;
        }
        let sess = &mut self.sessions[session];
        info!(
            session = sess.id,
            pane = sess.pane_count(),
            pid = pane.pid,
            "pane created"
        );
        sess.add_pane(pane);
        Disposition::Keep
    }

    /// Attach request: hand the target session's masters and cached
    /// snapshots to this connection and rebind the session. A miss is
    /// signalled by a zero pane count.
    fn handle_attach(&mut self, idx: usize, frame: &Frame) -> Disposition {
        let Some(raw) = frame.payload.get(..4) else {
            return Disposition::Close;
        };
        let id = u32::from_ne_bytes(raw.try_into().expect("4 bytes"));

        let target = self.sessions.iter().position(|s| s.id == id && s.detached);
        let Some(stream) = self.clients[idx].as_ref() else {
            return Disposition::Close;
        };

        let Some(pos) = target else {
            warn!(session = id, "attach failed: not found or not detached");
            let _ = write_raw_u32(&mut (&*stream), 0);
            return Disposition::Keep;
        };

        match write_attach_sequence(stream, &mut self.sessions[pos], idx) {
            Ok(()) => Disposition::Keep,
            Err(e) => {
                warn!(error = %e, "attach sequence failed");
                Disposition::Close
            }
        }
    }

    fn handle_grid_save(&mut self, session: usize, frame: Frame) {
        let Some(raw) = frame.payload.get(..4) else {
            warn!("grid snapshot without a pane id");
            return;
        };
        let pane_id = u32::from_ne_bytes(raw.try_into().expect("4 bytes"));
        let len = frame.payload.len();
        if self.sessions[session].store_snapshot(pane_id, frame.payload) {
            debug!(pane = pane_id, len, "snapshot cached");
        } else {
            warn!(pane = pane_id, "snapshot for impossible pane id dropped");
        }
    }

    /// Drains exited children after a `SIGCHLD` wake-up. Freeing the last
    /// slot of a session schedules the whole session for teardown.
    fn reap_children(&mut self) {
        for sess in &mut self.sessions {
            for slot in sess.panes_mut() {
                if let Some(pane) = slot {
                    match pane.child.try_wait() {
                        Ok(Some(status)) => {
                            info!(pid = pane.pid, ?status, "pane shell exited");
                            *slot = None;
                        }
                        Ok(None) => {}
                        Err(e) => {
                            warn!(pid = pane.pid, error = %e, "wait failed, freeing slot");
                            *slot = None;
                        }
                    }
                }
            }
            if sess.pane_count() > 0 && sess.live_count() == 0 {
                sess.defunct = true;
            }
        }

        let mut to_close = Vec::new();
        for sess in &self.sessions {
            if sess.defunct {
                info!(session = sess.id, "all panes exited, tearing down");
                if let Some(conn) = sess.client {
                    to_close.push(conn);
                }
            }
        }
        for conn in to_close {
            self.close_conn(conn);
        }
        self.sessions.retain(|s| !s.defunct);
    }
}

/// The attach reply: pane count, one descriptor per live pane, snapshot
/// count, then the cached snapshots as framed messages. The session is
/// rebound to `conn` only once everything is on the wire.
fn write_attach_sequence(
    stream: &UnixStream,
    sess: &mut Session,
    conn: usize,
) -> Result<(), ServerError> {
    debug!(
        session = sess.id,
        panes = sess.live_count(),
        snapshots = sess.snapshot_count(),
        "attaching"
    );
    write_raw_u32(&mut (&*stream), sess.live_count() as u32)?;
    for pane in sess.live_panes() {
        send_fd(stream, pane.master_fd.as_fd())?;
    }
    let snapshots = sess.take_snapshots();
    write_raw_u32(&mut (&*stream), snapshots.len() as u32)?;
    for snapshot in snapshots {
        write_message(&mut (&*stream), MsgType::GridSave, &snapshot)?;
    }
    (&*stream).flush()?;
    sess.client = Some(conn);
    sess.detached = false;
    Ok(())
}
