//! Process detachment for running EchoLog as a background service

use crate::{EchologError, Result};
use std::io;

/// Detach the process from the controlling terminal.
///
/// Standard double-fork sequence: fork, become a session leader, fork
/// again so the daemon can never reacquire a terminal, clear the umask,
/// move to `/`, and point the three standard descriptors at `/dev/null`.
/// Only stdin/stdout/stderr are touched; the listening socket and the
/// logging sink are created after detaching.
///
/// Must be called before the async runtime starts: forking a process with
/// live runtime threads is not supported.
pub fn daemonize() -> Result<()> {
    // SAFETY: single-threaded at this point; only async-signal-safe libc
    // calls are made between the forks.
    unsafe {
        match libc::fork() {
            -1 => return Err(daemon_error("fork")),
            0 => {}
            _ => libc::_exit(0),
        }

        if libc::setsid() == -1 {
            return Err(daemon_error("setsid"));
        }

        match libc::fork() {
            -1 => return Err(daemon_error("fork")),
            0 => {}
            _ => libc::_exit(0),
        }

        libc::umask(0);

        if libc::chdir(c"/".as_ptr()) == -1 {
            return Err(daemon_error("chdir"));
        }

        let null = libc::open(c"/dev/null".as_ptr(), libc::O_RDWR);
        if null == -1 {
            return Err(daemon_error("open /dev/null"));
        }
        for fd in 0..=2 {
            if libc::dup2(null, fd) == -1 {
                return Err(daemon_error("dup2"));
            }
        }
        if null > 2 {
            libc::close(null);
        }
    }

    Ok(())
}

fn daemon_error(op: &str) -> EchologError {
    EchologError::Server(format!(
        "Failed to daemonize ({}): {}",
        op,
        io::Error::last_os_error()
    ))
}
