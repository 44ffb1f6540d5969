//! Backend query client.
//!
//! A lookup asks the backend store for `<prefix><name>` and gets back one of
//! three answers: an address, "not found", or an error. [`CommandResolver`]
//! gets that answer by running the store's CLI and reading one line from its
//! stdout.

use std::io::Read;
use std::net::Ipv4Addr;
use std::os::fd::AsRawFd;
use std::process::{Child, ChildStdout, Command, ExitStatus, Stdio};
use std::time::{Duration, Instant};

use crate::config::BackendConfig;
use crate::error::{NssError, Result};
use crate::util::{os_code, poll_readable};

/// Longest output line kept from the backend; the rest is discarded.
const MAX_LINE: usize = 255;

/// Interval between exit-status checks while waiting for the child.
const REAP_POLL: Duration = Duration::from_millis(5);

/// Resolves a hostname to a single IPv4 address.
///
/// Implementations return [`NssError::NotFound`] when the store has no entry
/// and any other error when the store could not be asked.
pub trait Resolve {
    /// Looks up `name`.
    ///
    /// # Errors
    ///
    /// Returns [`NssError::NotFound`] for absent names, or a backend error.
    fn resolve(&self, name: &str) -> Result<Ipv4Addr>;
}

impl<F> Resolve for F
where
    F: Fn(&str) -> Result<Ipv4Addr>,
{
    fn resolve(&self, name: &str) -> Result<Ipv4Addr> {
        self(name)
    }
}

/// Resolves names by running the backend CLI once per lookup.
///
/// The child runs as `program args... <key>` with stdin and stderr pointed
/// at `/dev/null`. The whole exchange (reading its output and reaping it)
/// is bounded by [`BackendConfig::timeout`]; a child still running at the
/// deadline is killed.
#[derive(Debug, Clone)]
pub struct CommandResolver {
    config: BackendConfig,
}

impl CommandResolver {
    #[must_use]
    pub const fn new(config: BackendConfig) -> Self {
        Self { config }
    }

    /// Returns the active configuration.
    #[must_use]
    pub const fn config(&self) -> &BackendConfig {
        &self.config
    }
}

impl Resolve for CommandResolver {
    fn resolve(&self, name: &str) -> Result<Ipv4Addr> {
        if !is_valid_name(name) {
            tracing::debug!(name = %name, "Rejecting name that cannot form a store key");
            return Err(NssError::not_found(name));
        }

        let key = self.config.key_for(name);
        let timeout = self.config.timeout;
        let deadline = Instant::now() + timeout;

        tracing::debug!(program = %self.config.program, key = %key, "Querying backend");

        let child = Command::new(&self.config.program)
            .args(&self.config.args)
            .arg(&key)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .spawn()
            .map_err(|e| {
                tracing::warn!(program = %self.config.program, error = %e, "Failed to spawn backend");
                NssError::BackendUnavailable { code: os_code(&e) }
            })?;

        let mut guard = ChildGuard::new(child);
        let line = guard.read_line(deadline, timeout)?;
        let status = guard.wait(deadline, timeout)?;

        if !status.success() {
            tracing::debug!(key = %key, %status, "Backend reported no entry");
            return Err(NssError::not_found(name));
        }

        parse_address(name, line.as_bytes())
    }
}

/// Hostnames become path components of the store key; anything that could
/// step outside the namespace never reaches the backend.
fn is_valid_name(name: &str) -> bool {
    !name.is_empty()
        && !name
            .bytes()
            .any(|b| b == b'/' || b == 0 || b.is_ascii_whitespace() || b.is_ascii_control())
}

/// Parses the first line of backend output as a dotted quad.
///
/// # Errors
///
/// Returns [`NssError::NotFound`] for empty output and
/// [`NssError::MalformedAddress`] for anything that is not an IPv4 address.
pub fn parse_address(name: &str, output: &[u8]) -> Result<Ipv4Addr> {
    let line = output.split(|&b| b == b'\n').next().unwrap_or_default();
    let line = line.trim_ascii();

    if line.is_empty() {
        return Err(NssError::not_found(name));
    }

    std::str::from_utf8(line)
        .ok()
        .and_then(|s| s.parse().ok())
        .ok_or_else(|| {
            let output = String::from_utf8_lossy(line).into_owned();
            tracing::warn!(name = %name, output = %output, "Backend returned malformed address");
            NssError::MalformedAddress { output }
        })
}

/// First line of the child's stdout, held on the stack.
struct Line {
    buf: [u8; MAX_LINE],
    len: usize,
}

impl Line {
    fn as_bytes(&self) -> &[u8] {
        &self.buf[..self.len]
    }
}

/// Owns the spawned backend and reaps it on every exit path.
///
/// Dropping an unreaped guard kills the child and waits for it, so an early
/// return never leaves a zombie behind.
struct ChildGuard {
    child: Child,
    reaped: bool,
}

impl ChildGuard {
    const fn new(child: Child) -> Self {
        Self {
            child,
            reaped: false,
        }
    }

    /// Reads the first line of output, then drains stdout to EOF so the
    /// child never blocks on a full pipe.
    fn read_line(&mut self, deadline: Instant, timeout: Duration) -> Result<Line> {
        let mut stdout: ChildStdout = self
            .child
            .stdout
            .take()
            .ok_or(NssError::BackendIo { code: libc::EBADF })?;

        let mut line = Line {
            buf: [0; MAX_LINE],
            len: 0,
        };
        let mut line_done = false;
        let mut scratch = [0u8; 512];

        loop {
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                tracing::warn!(?timeout, "Backend did not finish writing before the deadline");
                return Err(NssError::Timeout { after: timeout });
            }

            let readable = poll_readable(stdout.as_raw_fd(), remaining).map_err(|e| {
                tracing::warn!(error = %e, "poll on backend pipe failed");
                NssError::BackendIo { code: os_code(&e) }
            })?;
            if !readable {
                continue;
            }

            let dest = if line_done {
                &mut scratch[..]
            } else {
                &mut line.buf[line.len..]
            };

            let n = match stdout.read(dest) {
                Ok(0) => return Ok(line),
                Ok(n) => n,
                Err(e) if e.kind() == std::io::ErrorKind::Interrupted => continue,
                Err(e) => {
                    tracing::warn!(error = %e, "Reading backend output failed");
                    return Err(NssError::BackendIo { code: os_code(&e) });
                }
            };

            if !line_done {
                let fresh = &line.buf[line.len..line.len + n];
                line_done = fresh.contains(&b'\n') || line.len + n == MAX_LINE;
                line.len += n;
            }
        }
    }

    /// Waits for the child's exit status until `deadline`.
    fn wait(&mut self, deadline: Instant, timeout: Duration) -> Result<ExitStatus> {
        loop {
            match self.child.try_wait() {
                Ok(Some(status)) => {
                    self.reaped = true;
                    return Ok(status);
                }
                Ok(None) => {
                    let remaining = deadline.saturating_duration_since(Instant::now());
                    if remaining.is_zero() {
                        tracing::warn!(?timeout, "Backend did not exit before the deadline");
                        return Err(NssError::Timeout { after: timeout });
                    }
                    std::thread::sleep(remaining.min(REAP_POLL));
                }
                Err(e) => {
                    tracing::warn!(error = %e, "Waiting for backend failed");
                    return Err(NssError::BackendIo { code: os_code(&e) });
                }
            }
        }
    }
}

impl Drop for ChildGuard {
    fn drop(&mut self) {
        if self.reaped {
            return;
        }
        if let Err(e) = self.child.kill() {
            tracing::debug!(error = %e, "Backend already exited");
        }
        if let Err(e) = self.child.wait() {
            tracing::warn!(error = %e, "Failed to reap backend");
        }
    }
}
