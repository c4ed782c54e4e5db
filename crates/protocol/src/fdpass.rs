//! File-descriptor passing over the local socket.
//!
//! Descriptors travel out of band as `SCM_RIGHTS` ancillary data. A one
//! byte dummy payload accompanies every transfer so the stream always
//! delivers data and ancillary message together.

use std::io::{IoSlice, IoSliceMut};
use std::os::fd::{AsRawFd, BorrowedFd, FromRawFd, OwnedFd, RawFd};

use nix::errno::Errno;
use nix::sys::socket::{recvmsg, sendmsg, ControlMessage, ControlMessageOwned, MsgFlags};

use crate::error::ProtocolError;

/// Sends `fd` over `sock`. The sender keeps its own copy; the kernel
/// duplicates the descriptor into the receiver.
pub fn send_fd(sock: &impl AsRawFd, fd: BorrowedFd<'_>) -> Result<(), ProtocolError> {
    let dummy = [0u8; 1];
    let iov = [IoSlice::new(&dummy)];
    let fds = [fd.as_raw_fd()];
    let cmsg = [ControlMessage::ScmRights(&fds)];
    loop {
        match sendmsg::<()>(sock.as_raw_fd(), &iov, &cmsg, MsgFlags::empty(), None) {
            Ok(_) => return Ok(()),
            Err(Errno::EINTR) => continue,
            Err(e) => return Err(ProtocolError::Sys(e)),
        }
    }
}

/// Receives one descriptor from `sock`.
pub fn recv_fd(sock: &impl AsRawFd) -> Result<OwnedFd, ProtocolError> {
    let mut dummy = [0u8; 1];
    let mut iov = [IoSliceMut::new(&mut dummy)];
    let mut cmsg_buf = nix::cmsg_space!([RawFd; 1]);
    loop {
        match recvmsg::<()>(
            sock.as_raw_fd(),
            &mut iov,
            Some(&mut cmsg_buf),
            MsgFlags::empty(),
        ) {
            Ok(msg) => {
                for cmsg in msg.cmsgs()? {
                    if let ControlMessageOwned::ScmRights(fds) = cmsg {
                        if let Some(&fd) = fds.first() {
                            // The kernel installed the descriptor into this
                            // process; we are its sole owner.
                            return Ok(unsafe { OwnedFd::from_raw_fd(fd) });
                        }
                    }
                }
                return Err(ProtocolError::NoFdReceived);
            }
            Err(Errno::EINTR) => continue,
            Err(e) => return Err(ProtocolError::Sys(e)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::{Read, Seek, SeekFrom, Write};
    use std::os::unix::net::UnixStream;

    #[test]
    fn descriptor_survives_the_trip() {
        let (left, right) = UnixStream::pair().unwrap();

        let mut file = tempfile::tempfile().unwrap();
        file.write_all(b"payload").unwrap();
        file.flush().unwrap();

        send_fd(&left, std::os::fd::AsFd::as_fd(&file)).unwrap();
        let received = recv_fd(&right).unwrap();

        // The received descriptor references the same open file.
        let mut clone = std::fs::File::from(received);
        clone.seek(SeekFrom::Start(0)).unwrap();
        let mut text = String::new();
        clone.read_to_string(&mut text).unwrap();
        assert_eq!(text, "payload");
    }

    #[test]
    fn plain_byte_without_ancillary_data_is_an_error() {
        let (mut left, right) = UnixStream::pair().unwrap();
        left.write_all(&[0]).unwrap();
        assert!(matches!(
            recv_fd(&right),
            Err(ProtocolError::NoFdReceived)
        ));
    }
}
