//! muxkit: a minimal terminal multiplexer.
//!
//! The binary is both halves of the system. Normal invocations run the
//! front-end; the hidden `__server` mode is how a front-end launches the
//! per-user daemon, and `__new-detached` is the background half of
//! `new-session`.

use std::path::Path;
use std::process::{Command, ExitCode, Stdio};

use clap::Parser;
use tracing_subscriber::EnvFilter;

use muxkit_client::ClientError;
use muxkit_protocol::paths;

const KEY_HELP: &str = "\
Key bindings:
  Ctrl+B d   Detach from current session
  Ctrl+B %   Split pane vertically
  Ctrl+B o   Switch to next pane
  Ctrl+B [   Scroll up (view history)
  Ctrl+B ]   Scroll down
";

#[derive(Parser)]
#[command(
    name = "muxkit",
    version,
    about = "a minimal terminal multiplexer",
    after_help = KEY_HELP
)]
struct Cli {
    /// List all sessions
    #[arg(short = 'l')]
    list: bool,

    /// Attach to a detached session by id
    #[arg(short = 's', value_name = "id")]
    attach: Option<u32>,

    /// Kill a session by id
    #[arg(short = 'k', value_name = "id")]
    kill: Option<u32>,

    /// Create a session in the background without attaching
    #[arg(short = 'n', long = "new-session")]
    new_session: bool,

    /// `new-session`, or an internal worker mode
    #[arg(value_name = "command", hide = true)]
    command: Option<String>,
}

/// File logging via `tracing`; `MUXKIT_LOG` selects the filter. A failure
/// to set up logging is not a reason to refuse to run.
fn init_logging(path: &Path) {
    let Ok(file) = std::fs::File::create(path) else {
        return;
    };
    let filter = EnvFilter::try_from_env("MUXKIT_LOG").unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::sync::Arc::new(file))
        .with_ansi(false)
        .try_init();
}

/// The background half of `new-session`: the parent spawns this binary
/// detached and returns immediately.
fn spawn_background_session() -> Result<i32, ClientError> {
    if muxkit_client::session_is_nested() {
        eprint!("{}", muxkit_client::NESTED_WARNING);
        return Ok(255);
    }
    let exe = std::env::current_exe()?;
    Command::new(exe)
        .arg("__new-detached")
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .spawn()?;
    Ok(0)
}

fn exit_from(result: Result<i32, ClientError>) -> ExitCode {
    match result {
        Ok(code) => ExitCode::from(code as u8),
        Err(e) => {
            tracing::error!(error = %e, "client failed");
            eprintln!("muxkit: {e}");
            ExitCode::from(255)
        }
    }
}

fn main() -> ExitCode {
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(e)
            if matches!(
                e.kind(),
                clap::error::ErrorKind::DisplayHelp | clap::error::ErrorKind::DisplayVersion
            ) =>
        {
            let _ = e.print();
            return ExitCode::SUCCESS;
        }
        Err(e) => {
            let _ = e.print();
            return ExitCode::from(255);
        }
    };

    if paths::ensure_runtime_dir().is_err() {
        eprintln!("muxkit: cannot create runtime directory");
        return ExitCode::from(255);
    }

    match cli.command.as_deref() {
        Some("__server") => {
            init_logging(&paths::server_log_path());
            return match muxkit_server::run() {
                Ok(()) => ExitCode::SUCCESS,
                Err(e) => {
                    tracing::error!(error = %e, "server failed");
                    ExitCode::from(255)
                }
            };
        }
        Some("__new-detached") => {
            init_logging(&paths::client_log_path());
            return exit_from(muxkit_client::run_new_session_detached());
        }
        Some("new-session") | None => {}
        Some(other) => {
            eprintln!("muxkit: unknown command: {other}");
            return ExitCode::from(255);
        }
    }

    init_logging(&paths::client_log_path());
    let wants_background = cli.new_session || cli.command.as_deref() == Some("new-session");

    let result = if cli.list {
        muxkit_client::run_list()
    } else if let Some(id) = cli.kill {
        muxkit_client::run_kill(id)
    } else if let Some(id) = cli.attach {
        muxkit_client::run_attach(id)
    } else if wants_background {
        spawn_background_session()
    } else {
        muxkit_client::run_new_session()
    };
    exit_from(result)
}
