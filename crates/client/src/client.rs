//! The front-end: connection management, startup flows, and the event
//! loop driving the state machine.
//!
//! The loop blocks in one `poll(2)` over standard input, the server link,
//! every pane master, and the signal self-pipe. Signal flags are inspected
//! before regular readiness; all handlers run to completion between wakes.

use std::io::{self, Read, Write};
use std::os::fd::{AsFd, AsRawFd, BorrowedFd};
use std::os::unix::fs::OpenOptionsExt;
use std::os::unix::net::UnixStream;
use std::process::{Command, Stdio};
use std::time::Duration;

use crossterm::cursor::MoveTo;
use crossterm::execute;
use crossterm::terminal::{self, Clear, ClearType, EnterAlternateScreen, LeaveAlternateScreen};
use nix::fcntl::{Flock, FlockArg};
use nix::poll::{poll, PollFd, PollFlags, PollTimeout};
use nix::sys::signal::{signal, SigHandler, Signal};
use tracing::{debug, info, warn};

use muxkit_grid::snapshot;
use muxkit_protocol::{
    paths, read_frame, read_raw_u32, read_text_reply, recv_fd, write_message, MsgType,
    ProtocolError, SignalWakeup, WindowSize, CMD_NEW_SESSION, CMD_PANE_SPLIT, PROTOCOL_VERSION,
};
use muxkit_term::{Pane, Window};

use crate::error::ClientError;
use crate::fsm::{self, Action, Event, State};
use crate::keybinds::{KeyAction, Keybinds};
use crate::render;

pub const NESTED_WARNING: &str = "sessions should be nested with care\n";
pub const PROTOCOL_MISMATCH: &str = "protocol version mismatch\n";

/// The prefix byte, Ctrl+B.
const PREFIX_KEY: u8 = 0x02;

nix::ioctl_write_ptr_bad!(tiocswinsz, nix::libc::TIOCSWINSZ, nix::pty::Winsize);

/// Reports a pane's size to its PTY so the shell sees the right geometry.
fn set_pty_size(fd: BorrowedFd<'_>, rows: u16, cols: u16) {
    let ws = nix::pty::Winsize {
        ws_row: rows,
        ws_col: cols,
        ws_xpixel: 0,
        ws_ypixel: 0,
    };
    if let Err(e) = unsafe { tiocswinsz(fd.as_raw_fd(), &ws) } {
        warn!(error = %e, "TIOCSWINSZ failed");
    }
}

/// True when this terminal already runs inside a multiplexer.
pub fn session_is_nested() -> bool {
    ["MUXKIT", "TMUX"]
        .iter()
        .any(|var| std::env::var_os(var).is_some_and(|v| !v.is_empty()))
}

/// Connects to the per-user server, launching it if needed.
///
/// The launch is guarded by an exclusive advisory lock on the socket's
/// sibling lock file: the winner unlinks any stale socket and spawns the
/// server as a detached child of this executable, everyone else blocks on
/// the lock and then connects normally.
pub fn connect() -> Result<UnixStream, ClientError> {
    paths::ensure_runtime_dir()?;
    let socket = paths::socket_path();
    if let Ok(stream) = UnixStream::connect(&socket) {
        return Ok(stream);
    }
    debug!("connect failed, starting the server");

    let lock_file = std::fs::OpenOptions::new()
        .read(true)
        .write(true)
        .create(true)
        .truncate(false)
        .mode(0o600)
        .open(paths::lock_path())?;
    let lock = Flock::lock(lock_file, FlockArg::LockExclusive)
        .map_err(|(_, errno)| ClientError::Sys(errno))?;

    // Another front-end may have won the race while we waited on the lock.
    if let Ok(stream) = UnixStream::connect(&socket) {
        return Ok(stream);
    }
    match std::fs::remove_file(&socket) {
        Ok(()) => debug!("removed stale socket"),
        Err(e) if e.kind() == io::ErrorKind::NotFound => {}
        Err(e) => return Err(ClientError::Io(e)),
    }

    let exe = std::env::current_exe()?;
    Command::new(exe)
        .arg("__server")
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .spawn()?;

    for _ in 0..100 {
        if let Ok(stream) = UnixStream::connect(&socket) {
            drop(lock);
            return Ok(stream);
        }
        std::thread::sleep(Duration::from_millis(20));
    }
    Err(ClientError::ServerUnreachable)
}

/// Exchanges protocol versions. `false` means the peer disagreed and the
/// connection is dead.
fn handshake(mut stream: &UnixStream) -> Result<bool, ClientError> {
    write_message(
        &mut stream,
        MsgType::Version,
        &PROTOCOL_VERSION.to_ne_bytes(),
    )?;
    match read_raw_u32(&mut stream)? {
        Some(version) if version == PROTOCOL_VERSION => Ok(true),
        _ => Ok(false),
    }
}

fn print_now(text: &str) -> io::Result<()> {
    let mut out = io::stdout();
    out.write_all(text.as_bytes())?;
    out.flush()
}

/// `-l`: print the session listing.
pub fn run_list() -> Result<i32, ClientError> {
    let stream = connect()?;
    if !handshake(&stream)? {
        print_now(PROTOCOL_MISMATCH)?;
        return Ok(0);
    }
    write_message(&mut &stream, MsgType::ListSessions, &[])?;
    let text = read_text_reply(&mut &stream)?;
    print_now(&text)?;
    Ok(0)
}

/// `-k <id>`: kill a session and print the server's verdict.
pub fn run_kill(id: u32) -> Result<i32, ClientError> {
    let stream = connect()?;
    if !handshake(&stream)? {
        print_now(PROTOCOL_MISMATCH)?;
        return Ok(0);
    }
    write_message(&mut &stream, MsgType::DetachKill, &id.to_ne_bytes())?;
    let text = read_text_reply(&mut &stream)?;
    print_now(&text)?;
    Ok(0)
}

/// Default invocation: create a session on this terminal and run.
pub fn run_new_session() -> Result<i32, ClientError> {
    if session_is_nested() {
        print_now(NESTED_WARNING)?;
        return Ok(255);
    }
    let stream = connect()?;
    if !handshake(&stream)? {
        print_now(PROTOCOL_MISMATCH)?;
        return Ok(0);
    }

    let (cols, rows) = terminal::size()?;
    let pane_height = rows.saturating_sub(1);
    let ws = WindowSize {
        rows: pane_height,
        cols,
    };
    write_message(&mut &stream, MsgType::Resize, &ws.encode())?;
    write_message(
        &mut &stream,
        MsgType::Command,
        format!("{CMD_NEW_SESSION}\0").as_bytes(),
    )?;
    let master = recv_fd(&stream)?;

    let mut window = Window::new("New Window");
    let pane = window.add_pane(u32::from(cols), u32::from(pane_height), 0, 0);
    pane.master = Some(master);

    Client::new(stream, window, cols, rows)?.run()
}

/// `-n` / `new-session` (inner half): create a session and leave it
/// detached without ever touching this terminal. The caller has already
/// put us in the background.
pub fn run_new_session_detached() -> Result<i32, ClientError> {
    let stream = connect()?;
    if !handshake(&stream)? {
        return Ok(0);
    }
    // No terminal to measure; the first real attach resizes everything.
    let ws = WindowSize { rows: 23, cols: 80 };
    write_message(&mut &stream, MsgType::Resize, &ws.encode())?;
    write_message(
        &mut &stream,
        MsgType::Command,
        format!("{CMD_NEW_SESSION}\0").as_bytes(),
    )?;
    let master = recv_fd(&stream)?;
    drop(master);
    write_message(&mut &stream, MsgType::Detach, &[])?;
    info!("background session created");
    Ok(0)
}

/// `-s <id>`: attach to a detached session.
pub fn run_attach(session_id: u32) -> Result<i32, ClientError> {
    let stream = connect()?;
    if !handshake(&stream)? {
        print_now(PROTOCOL_MISMATCH)?;
        return Ok(0);
    }

    write_message(&mut &stream, MsgType::Detach, &session_id.to_ne_bytes())?;
    let pane_count = read_raw_u32(&mut &stream)?.unwrap_or(0);
    if pane_count == 0 {
        print_now(&format!(
            "attach failed: session {session_id} not found or not detached\n"
        ))?;
        warn!(session = session_id, "attach failed");
        return Ok(0);
    }
    info!(session = session_id, panes = pane_count, "attaching");

    let (cols, rows) = terminal::size()?;
    let pane_height = u32::from(rows.saturating_sub(1));
    let pane_width = Window::pane_width_for(u32::from(cols), pane_count);

    let mut window = Window::new("Attached Window");
    for i in 0..pane_count {
        let master = recv_fd(&stream)?;
        set_pty_size(master.as_fd(), pane_height as u16, pane_width as u16);
        let pane = window.add_pane(pane_width, pane_height, i * (pane_width + 1), 0);
        pane.master = Some(master);
    }

    let snapshot_count = read_raw_u32(&mut &stream)?.unwrap_or(0);
    for _ in 0..snapshot_count {
        let frame = read_frame(&mut &stream)?.ok_or(ProtocolError::TruncatedFrame)?;
        if frame.msg_type() != Some(MsgType::GridSave) {
            warn!(kind = frame.kind, "unexpected frame in attach sequence");
            continue;
        }
        let Some(raw) = frame.payload.get(..4) else {
            continue;
        };
        let pane_id = u32::from_ne_bytes(raw.try_into().expect("4 bytes"));
        let Some(pane) = window.panes_mut().iter_mut().find(|p| p.id == pane_id) else {
            warn!(pane = pane_id, "snapshot for unknown pane dropped");
            continue;
        };
        match snapshot::deserialize(&mut pane.grid, &frame.payload) {
            Ok((_, cursor)) => {
                // The snapshot may come from a differently sized terminal.
                if pane.grid.width != pane.sx || pane.grid.height != pane.sy {
                    pane.grid.resize(pane.sx, pane.sy);
                }
                pane.replay_snapshot(cursor.cx, cursor.cy);
                debug!(pane = pane_id, "snapshot replayed");
            }
            Err(e) => warn!(pane = pane_id, error = %e, "snapshot rejected"),
        }
    }

    Client::new(stream, window, cols, rows)?.run()
}

enum Token {
    Signal,
    Stdin,
    Server,
    Pane(u32),
}

pub struct Client {
    state: State,
    server: UnixStream,
    window: Window,
    /// Full terminal size; panes get `rows − 1`, the last row is status.
    cols: u16,
    rows: u16,
    keybinds: Keybinds,
    wakeup: SignalWakeup,
    prefix_armed: bool,
    child_exited: bool,
    /// Wired into cursor rendering but never toggled.
    sync_input_mode: bool,
}

impl Client {
    fn new(
        server: UnixStream,
        window: Window,
        cols: u16,
        rows: u16,
    ) -> Result<Client, ClientError> {
        // A dead peer must surface as an error, not a process kill.
        unsafe {
            let _ = signal(Signal::SIGPIPE, SigHandler::SigIgn);
        }
        let mut wakeup = SignalWakeup::new()?;
        wakeup.watch(signal_hook::consts::SIGWINCH)?;
        wakeup.watch(signal_hook::consts::SIGCHLD)?;

        Ok(Client {
            state: State::Boot,
            server,
            window,
            cols,
            rows,
            keybinds: Keybinds::load(&paths::keybinds_path()),
            wakeup,
            prefix_armed: false,
            child_exited: false,
            sync_input_mode: false,
        })
    }

    pub fn run(mut self) -> Result<i32, ClientError> {
        self.dispatch(Event::EnableRawMode);
        execute!(
            io::stdout(),
            EnterAlternateScreen,
            Clear(ClearType::All),
            MoveTo(0, 0)
        )?;
        self.render_all();

        info!("entering client loop");
        let result = self.run_loop();
        // Every exit path restores the terminal; doing it again is a no-op.
        self.restore_terminal();

        let pid = format!("{}\0", std::process::id());
        let _ = write_message(&mut (&self.server), MsgType::Exited, pid.as_bytes());
        info!("client exiting");
        result.map(|()| 0)
    }

    fn run_loop(&mut self) -> Result<(), ClientError> {
        let stdin = io::stdin();
        while !self.child_exited {
            let mut ready = Vec::new();
            {
                let mut fds = vec![PollFd::new(self.wakeup.poll_fd(), PollFlags::POLLIN)];
                let mut tokens = vec![Token::Signal];
                fds.push(PollFd::new(stdin.as_fd(), PollFlags::POLLIN));
                tokens.push(Token::Stdin);
                fds.push(PollFd::new(self.server.as_fd(), PollFlags::POLLIN));
                tokens.push(Token::Server);
                for pane in self.window.panes() {
                    if let Some(master) = &pane.master {
                        fds.push(PollFd::new(master.as_fd(), PollFlags::POLLIN));
                        tokens.push(Token::Pane(pane.id));
                    }
                }

                match poll(&mut fds, PollTimeout::NONE) {
                    Ok(_) => {
                        for (fd, token) in fds.iter().zip(tokens) {
                            let revents = fd.revents().unwrap_or(PollFlags::empty());
                            if revents.intersects(
                                PollFlags::POLLIN | PollFlags::POLLHUP | PollFlags::POLLERR,
                            ) {
                                ready.push(token);
                            }
                        }
                    }
                    // Interrupted by a signal: fall through to flag checks.
                    Err(nix::errno::Errno::EINTR) => {}
                    Err(e) => {
                        self.dispatch(Event::Interrupt);
                        return Err(ClientError::Sys(e));
                    }
                }
            }

            if self.wakeup.take(signal_hook::consts::SIGWINCH) {
                self.dispatch(Event::Winch);
            }
            if self.wakeup.take(signal_hook::consts::SIGCHLD) {
                self.dispatch(Event::ChldExit);
            }
            if self.child_exited {
                break;
            }

            let mut pane_removed = false;
            let mut stdin_ready = false;
            for token in ready {
                match token {
                    Token::Signal => self.wakeup.drain(),
                    Token::Stdin => stdin_ready = true,
                    Token::Server => {
                        // The server never sends unsolicited data; anything
                        // here is either noise to discard or the EOF that
                        // means the session is gone.
                        let mut byte = [0u8; 1];
                        match (&self.server).read(&mut byte) {
                            Ok(0) => self.dispatch(Event::EofPty),
                            Ok(_) => {}
                            Err(e) if e.kind() == io::ErrorKind::Interrupted => {}
                            Err(_) => self.dispatch(Event::EofPty),
                        }
                    }
                    Token::Pane(id) => {
                        let Some(idx) = self.window.panes().iter().position(|p| p.id == id)
                        else {
                            continue;
                        };
                        if !self.service_pane(idx) {
                            let pane = self.window.remove_pane(idx);
                            info!(pane = pane.id, "pane closed");
                            drop(pane);
                            pane_removed = true;
                            if self.window.is_empty() {
                                self.dispatch(Event::ChldExit);
                            }
                        }
                    }
                }
                if self.child_exited {
                    break;
                }
            }
            if self.child_exited {
                break;
            }

            if pane_removed {
                self.relayout();
            }
            self.refresh_chrome();

            if stdin_ready {
                self.dispatch(Event::StdinRead);
            }
        }
        Ok(())
    }

    /// Reads one chunk from the pane's master. `false` means the pane is
    /// gone (EOF or a fatal error) and must be removed.
    fn service_pane(&mut self, idx: usize) -> bool {
        let pane_count = self.window.len();
        let pane = &mut self.window.panes_mut()[idx];

        let mut buf = [0u8; 4096];
        let read = {
            let Some(master) = &pane.master else {
                return false;
            };
            nix::unistd::read(master, &mut buf)
        };
        match read {
            Ok(0) => false,
            Ok(n) => {
                let responses = pane.input(&buf[..n]);
                if !responses.is_empty() {
                    write_master(pane, &responses);
                }
                let mut out = io::stdout().lock();
                let _ = render::render_pane(&mut out, pane);
                if idx + 1 < pane_count {
                    let _ = render::render_pane_border(&mut out, pane);
                }
                let _ = out.flush();
                true
            }
            Err(nix::errno::Errno::EINTR) | Err(nix::errno::Errno::EAGAIN) => true,
            Err(e) => {
                warn!(error = %e, "pane read failed");
                false
            }
        }
    }

    /// Redraws the status bar and parks the cursor on the active pane.
    fn refresh_chrome(&mut self) {
        let in_history = self.window.active_pane().grid.scroll_offset > 0;
        let mut out = io::stdout().lock();
        let _ = render::render_status_bar(&mut out, &self.window.name, self.cols, self.rows, in_history);
        let _ = render::position_cursor(&mut out, self.window.active_pane(), self.sync_input_mode);
        let _ = out.flush();
    }

    /// Recomputes the equal-width layout, tells every PTY its new size, and
    /// repaints from scratch.
    fn relayout(&mut self) {
        let pane_height = u32::from(self.rows.saturating_sub(1));
        let layout = self.window.layout(u32::from(self.cols), pane_height);
        for pane in self.window.panes() {
            if let Some(master) = &pane.master {
                set_pty_size(master.as_fd(), layout.pane_height as u16, layout.pane_width as u16);
            }
        }
        self.render_all();
    }

    fn render_all(&mut self) {
        let mut out = io::stdout().lock();
        let _ = execute!(out, Clear(ClearType::All), MoveTo(0, 0));
        let count = self.window.len();
        for (i, pane) in self.window.panes().iter().enumerate() {
            let _ = render::render_pane(&mut out, pane);
            if i + 1 < count {
                let _ = render::render_pane_border(&mut out, pane);
            }
        }
        let in_history = self.window.active_pane().grid.scroll_offset > 0;
        let _ = render::render_status_bar(&mut out, &self.window.name, self.cols, self.rows, in_history);
        let _ = render::position_cursor(&mut out, self.window.active_pane(), self.sync_input_mode);
        let _ = out.flush();
    }

    fn restore_terminal(&mut self) {
        let _ = execute!(io::stdout(), LeaveAlternateScreen);
        let _ = terminal::disable_raw_mode();
    }

    fn dispatch(&mut self, event: Event) {
        match fsm::lookup(self.state, event) {
            Some(transition) => {
                if let Some(action) = transition.action {
                    self.act(action);
                }
                self.state = transition.next;
            }
            None => warn!(state = ?self.state, ?event, "unhandled event"),
        }
    }

    fn act(&mut self, action: Action) {
        match action {
            Action::EnableRawMode => {
                let _ = terminal::enable_raw_mode();
            }
            Action::Resize => self.act_resize(),
            Action::ChildExit => self.act_child_exit(),
            Action::PtyRead => {
                let idx = self.window.active_index();
                if !self.service_pane(idx) {
                    self.dispatch(Event::EofPty);
                }
            }
            Action::StdinRead => self.act_stdin_read(),
            Action::Detach => self.act_detach(),
            Action::PaneSplit => self.act_pane_split(),
        }
    }

    fn act_resize(&mut self) {
        let Ok((cols, rows)) = terminal::size() else {
            return;
        };
        self.cols = cols;
        self.rows = rows;
        self.relayout();

        // Informational; the server stores it but never pushes it to PTYs.
        let ws = WindowSize {
            rows: rows.saturating_sub(1),
            cols,
        };
        let _ = write_message(&mut (&self.server), MsgType::Resize, &ws.encode());
    }

    fn act_child_exit(&mut self) {
        self.child_exited = true;
        self.restore_terminal();
    }

    /// Snapshot every pane, tell the server to detach the session, and
    /// leave the terminal the way we found it.
    fn act_detach(&mut self) {
        for pane in self.window.panes() {
            let bytes = snapshot::serialize(&pane.grid, pane.id, pane.cx, pane.cy);
            if let Err(e) = write_message(&mut (&self.server), MsgType::GridSave, &bytes) {
                warn!(pane = pane.id, error = %e, "snapshot upload failed");
            }
        }
        if let Err(e) = write_message(&mut (&self.server), MsgType::Detach, &[]) {
            warn!(error = %e, "detach request failed");
        }
        info!("detached");
        self.child_exited = true;
        self.restore_terminal();
    }

    fn act_stdin_read(&mut self) {
        let stdin = io::stdin();
        let mut buf = [0u8; 4096];
        let n = match nix::unistd::read(&stdin, &mut buf) {
            Ok(0) => {
                self.dispatch(Event::EofStdin);
                return;
            }
            Ok(n) => n,
            Err(nix::errno::Errno::EINTR) | Err(nix::errno::Errno::EAGAIN) => return,
            Err(_) => {
                self.dispatch(Event::EofStdin);
                return;
            }
        };
        for i in 0..n {
            self.handle_byte(buf[i]);
            if self.child_exited {
                return;
            }
        }
    }

    fn handle_byte(&mut self, byte: u8) {
        if byte == PREFIX_KEY {
            if self.prefix_armed {
                // Prefix twice sends one literal prefix byte through.
                write_master(self.window.active_pane(), &[PREFIX_KEY]);
                self.prefix_armed = false;
            } else {
                self.prefix_armed = true;
            }
            return;
        }
        if self.prefix_armed {
            self.prefix_armed = false;
            self.handle_prefixed_key(byte);
            return;
        }

        // Any plain keystroke leaves history view; Esc and q are swallowed,
        // the rest go through to the shell.
        if self.window.active_pane().grid.scroll_offset > 0 {
            self.window.active_pane_mut().grid.scroll_offset = 0;
            let mut out = io::stdout().lock();
            let _ = render::render_pane(&mut out, self.window.active_pane());
            let _ = out.flush();
            if byte == 0x1b || byte == b'q' {
                return;
            }
        }
        write_master(self.window.active_pane(), &[byte]);
    }

    fn handle_prefixed_key(&mut self, key: u8) {
        match self.keybinds.lookup(key) {
            Some(KeyAction::DetachSession) => self.dispatch(Event::Detached),
            Some(KeyAction::NewPane) => self.dispatch(Event::PaneSplit),
            Some(KeyAction::NextPane) => {
                self.window.next_pane();
                let mut out = io::stdout().lock();
                let _ = render::render_pane(&mut out, self.window.active_pane());
                let _ = out.flush();
            }
            Some(KeyAction::ScrollUp) => self.scroll_active(|pane| {
                let step = pane.sy;
                pane.grid.scroll_up(step);
            }),
            Some(KeyAction::ScrollDown) => self.scroll_active(|pane| {
                let step = pane.sy;
                pane.grid.scroll_down(step);
            }),
            None => {
                // Unbound: the prefix byte and the raw key both go through.
                write_master(self.window.active_pane(), &[PREFIX_KEY, key]);
            }
        }
    }

    fn scroll_active(&mut self, scroll: impl FnOnce(&mut Pane)) {
        scroll(self.window.active_pane_mut());
        let mut out = io::stdout().lock();
        let _ = render::render_pane(&mut out, self.window.active_pane());
        let _ = out.flush();
        self.refresh_chrome();
    }

    /// Split: ask the server for a new pane, receive its master, and
    /// shrink everyone to the new equal width.
    fn act_pane_split(&mut self) {
        let count = self.window.len() as u32 + 1;
        let pane_height = u32::from(self.rows.saturating_sub(1));
        let pane_width = Window::pane_width_for(u32::from(self.cols), count);

        // Announce the post-split pane size, then request the pane.
        let ws = WindowSize {
            rows: pane_height as u16,
            cols: pane_width as u16,
        };
        if write_message(&mut (&self.server), MsgType::Resize, &ws.encode()).is_err() {
            return;
        }
        if write_message(
            &mut (&self.server),
            MsgType::Command,
            format!("{CMD_PANE_SPLIT}\0").as_bytes(),
        )
        .is_err()
        {
            return;
        }
        let master = match recv_fd(&self.server) {
            Ok(master) => master,
            Err(e) => {
                warn!(error = %e, "split failed: no master received");
                return;
            }
        };
        set_pty_size(master.as_fd(), pane_height as u16, pane_width as u16);

        let pane = self.window.add_pane(pane_width, pane_height, 0, 0);
        pane.master = Some(master);
        // Shrinks the existing panes, updates every PTY size, repaints.
        self.relayout();
    }
}

/// Writes keystrokes or emulator responses to a pane's PTY master,
/// retrying through interruption and short writes.
fn write_master(pane: &Pane, bytes: &[u8]) {
    let Some(master) = &pane.master else {
        return;
    };
    let mut offset = 0;
    while offset < bytes.len() {
        match nix::unistd::write(master, &bytes[offset..]) {
            Ok(n) => offset += n,
            Err(nix::errno::Errno::EINTR) => continue,
            Err(e) => {
                warn!(error = %e, "pane write failed");
                return;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn nesting_detection_reads_environment() {
        // Serialize against other env-touching tests by doing both cases
        // in one test body.
        std::env::remove_var("MUXKIT");
        std::env::remove_var("TMUX");
        assert!(!session_is_nested());

        std::env::set_var("MUXKIT", "123");
        assert!(session_is_nested());
        std::env::remove_var("MUXKIT");

        std::env::set_var("TMUX", "/tmp/tmux-1000/default,1,0");
        assert!(session_is_nested());
        std::env::remove_var("TMUX");

        // Empty values do not count as nesting.
        std::env::set_var("MUXKIT", "");
        assert!(!session_is_nested());
        std::env::remove_var("MUXKIT");
    }
}
