//! Error types and their mapping onto the NSS status contract.

use std::time::Duration;

use libc::c_int;
use thiserror::Error;

/// Result alias for lookup operations.
pub type Result<T> = std::result::Result<T, NssError>;

/// Host-error code: internal failure, consult `errno`.
pub const NETDB_INTERNAL: c_int = -1;
/// Host-error code: the host is unknown.
pub const HOST_NOT_FOUND: c_int = 1;
/// Host-error code: temporary failure, retry later.
pub const TRY_AGAIN: c_int = 2;
/// Host-error code: non-recoverable failure.
pub const NO_RECOVERY: c_int = 3;
/// Host-error code: the name is valid but has no address of this type.
pub const NO_DATA: c_int = 4;

/// Status returned to glibc's NSS dispatcher (`enum nss_status`).
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NssStatus {
    TryAgain = -2,
    Unavail = -1,
    NotFound = 0,
    Success = 1,
}

/// Terminal result of one lookup: status plus both error codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Outcome {
    pub status: NssStatus,
    pub errno: c_int,
    pub h_errno: c_int,
}

impl Outcome {
    /// The outcome of a lookup that filled the result buffer.
    pub const SUCCESS: Self = Self {
        status: NssStatus::Success,
        errno: 0,
        h_errno: 0,
    };
}

/// Errors returned by lookup operations.
#[derive(Debug, Error)]
pub enum NssError {
    /// Only `AF_INET` is serviced.
    #[error("address family {0} not supported")]
    AddressFamilyUnsupported(c_int),

    /// The backend has no entry for this name.
    #[error("host not found: {name}")]
    NotFound {
        /// The name that was looked up.
        name: String,
    },

    /// The backend process could not be started.
    #[error("backend unavailable (errno {code})")]
    BackendUnavailable {
        /// OS error captured at spawn time.
        code: c_int,
    },

    /// Reading the backend's output failed.
    #[error("backend I/O failed (errno {code})")]
    BackendIo {
        /// OS error captured from the failed read.
        code: c_int,
    },

    /// The backend did not answer within the configured deadline.
    #[error("backend timed out after {after:?}")]
    Timeout {
        /// The deadline that elapsed.
        after: Duration,
    },

    /// The backend answered with something that is not a dotted quad.
    #[error("backend returned malformed address: {output:?}")]
    MalformedAddress {
        /// The stripped output line.
        output: String,
    },

    /// The caller's buffer cannot hold the encoded result.
    #[error("buffer too small: need {needed} bytes, have {available}")]
    BufferTooSmall {
        /// Bytes the layout requires.
        needed: usize,
        /// Bytes the caller supplied.
        available: usize,
    },

    /// A precondition on the caller's arguments failed.
    #[error("invalid argument: {0}")]
    InvalidArgument(&'static str),

    /// Reverse lookups are not implemented.
    #[error("reverse lookup not implemented")]
    NotImplemented,

    /// The configuration file contains an unusable value.
    #[error("invalid config: {0}")]
    InvalidConfig(String),

    /// Reading the configuration file failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl NssError {
    /// Builds a [`NssError::NotFound`] for `name`.
    #[must_use]
    pub fn not_found(name: &str) -> Self {
        Self::NotFound {
            name: name.to_string(),
        }
    }

    /// Maps this error onto the status, `errno` and `h_errno` triple the
    /// NSS contract expects.
    #[must_use]
    pub fn outcome(&self) -> Outcome {
        let (status, errno, h_errno) = match self {
            Self::AddressFamilyUnsupported(_) | Self::NotImplemented => {
                (NssStatus::Unavail, libc::EAFNOSUPPORT, NO_DATA)
            }
            Self::InvalidArgument(_) | Self::InvalidConfig(_) => {
                (NssStatus::Unavail, libc::EINVAL, NO_RECOVERY)
            }
            Self::NotFound { .. } => (NssStatus::NotFound, libc::ENOENT, HOST_NOT_FOUND),
            Self::BackendIo { code } => (NssStatus::NotFound, *code, NO_DATA),
            Self::BackendUnavailable { code } => (NssStatus::Unavail, *code, NO_DATA),
            Self::Timeout { .. } => (NssStatus::TryAgain, libc::EAGAIN, TRY_AGAIN),
            Self::MalformedAddress { .. } => (NssStatus::NotFound, libc::ENOENT, NO_RECOVERY),
            // glibc doubles the buffer and retries on TRYAGAIN + ERANGE.
            Self::BufferTooSmall { .. } => (NssStatus::TryAgain, libc::ERANGE, NETDB_INTERNAL),
            Self::Io(e) => (
                NssStatus::Unavail,
                e.raw_os_error().unwrap_or(libc::EIO),
                NO_DATA,
            ),
        };
        Outcome {
            status,
            errno,
            h_errno,
        }
    }

    /// Returns `true` if a retry with a larger buffer could succeed.
    #[must_use]
    pub const fn is_buffer_too_small(&self) -> bool {
        matches!(self, Self::BufferTooSmall { .. })
    }
}
