//! Internal utilities.

use std::io;
use std::os::fd::RawFd;
use std::time::Duration;

/// Waits until `fd` is readable (data or EOF) or `timeout` elapses.
///
/// Returns `Ok(false)` on timeout. `EINTR` is reported as `Ok(false)` so the
/// caller re-checks its own deadline.
///
/// # Errors
///
/// Returns the OS error if `poll(2)` fails.
pub fn poll_readable(fd: RawFd, timeout: Duration) -> io::Result<bool> {
    let mut pfd = libc::pollfd {
        fd,
        events: libc::POLLIN,
        revents: 0,
    };
    // Round up so a sub-millisecond remainder still blocks instead of spinning.
    let ms = libc::c_int::try_from(timeout.as_micros().div_ceil(1000))
        .unwrap_or(libc::c_int::MAX);

    // SAFETY: `pfd` is a single valid pollfd living on our stack.
    let rc = unsafe { libc::poll(&raw mut pfd, 1, ms) };
    if rc < 0 {
        let err = io::Error::last_os_error();
        if err.kind() == io::ErrorKind::Interrupted {
            return Ok(false);
        }
        return Err(err);
    }
    Ok(rc > 0)
}

/// Returns the OS error code carried by `err`, or `EIO`.
#[must_use]
pub fn os_code(err: &io::Error) -> libc::c_int {
    err.raw_os_error().unwrap_or(libc::EIO)
}
