//! Runtime directory layout.
//!
//! Everything lives in a per-user directory `${TMPDIR:-/tmp}/muxkit-<uid>/`
//! (mode 0700): the listen socket `default`, its advisory lock file, the
//! optional key-binding file, and the log files.

use std::fs::DirBuilder;
use std::io;
use std::os::unix::fs::DirBuilderExt;
use std::path::PathBuf;

use nix::unistd::Uid;

/// The per-user runtime directory path (not created).
pub fn runtime_dir() -> PathBuf {
    let tmp = std::env::var_os("TMPDIR")
        .filter(|v| !v.is_empty())
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("/tmp"));
    tmp.join(format!("muxkit-{}", Uid::current()))
}

/// Creates the runtime directory (0700) if needed and returns it.
pub fn ensure_runtime_dir() -> io::Result<PathBuf> {
    let dir = runtime_dir();
    match DirBuilder::new().mode(0o700).create(&dir) {
        Ok(()) => {}
        Err(e) if e.kind() == io::ErrorKind::AlreadyExists => {}
        Err(e) => return Err(e),
    }
    if !dir.is_dir() {
        return Err(io::Error::new(
            io::ErrorKind::NotADirectory,
            format!("{} is not a directory", dir.display()),
        ));
    }
    Ok(dir)
}

pub fn socket_path() -> PathBuf {
    runtime_dir().join("default")
}

pub fn lock_path() -> PathBuf {
    runtime_dir().join("default.lock")
}

pub fn keybinds_path() -> PathBuf {
    runtime_dir().join("keybinds.conf")
}

pub fn client_log_path() -> PathBuf {
    runtime_dir().join("client.log")
}

pub fn server_log_path() -> PathBuf {
    runtime_dir().join("server.log")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn socket_lives_in_runtime_dir() {
        let socket = socket_path();
        assert!(socket.starts_with(runtime_dir()));
        assert_eq!(socket.file_name().unwrap(), "default");
        assert_eq!(lock_path().file_name().unwrap(), "default.lock");
    }

    #[test]
    fn runtime_dir_is_per_user() {
        let dir = runtime_dir();
        let name = dir.file_name().unwrap().to_string_lossy().into_owned();
        assert!(name.starts_with("muxkit-"));
        assert!(name["muxkit-".len()..].parse::<u32>().is_ok());
    }
}
