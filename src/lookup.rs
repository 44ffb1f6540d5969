//! Lookup dispatcher.
//!
//! Each call walks `Start -> QueryingBackend -> Encoding -> Done`, or drops
//! to `Failed` with an [`NssError`] at the first step that cannot proceed.
//! Nothing is kept between calls.

use std::net::Ipv4Addr;
use std::path::Path;

use libc::c_int;

use crate::backend::{CommandResolver, Resolve};
use crate::config::BackendConfig;
use crate::encoder::{self, HostentLayout};
use crate::error::{NssError, Result};

/// Address family requested by the caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AddressFamily {
    Inet,
    Inet6,
    Other(c_int),
}

impl From<c_int> for AddressFamily {
    fn from(af: c_int) -> Self {
        match af {
            libc::AF_INET => Self::Inet,
            libc::AF_INET6 => Self::Inet6,
            other => Self::Other(other),
        }
    }
}

impl From<AddressFamily> for c_int {
    fn from(af: AddressFamily) -> Self {
        match af {
            AddressFamily::Inet => libc::AF_INET,
            AddressFamily::Inet6 => libc::AF_INET6,
            AddressFamily::Other(other) => other,
        }
    }
}

/// Answers hostname lookups from a [`Resolve`] backend into caller buffers.
///
/// # Example
///
/// ```
/// use std::net::Ipv4Addr;
/// use nss_etcd::{Lookup, NssError, encoder::empty_hostent};
///
/// let lookup = Lookup::new(|name: &str| match name {
///     "foo" => Ok(Ipv4Addr::new(10, 0, 0, 5)),
///     _ => Err(NssError::not_found(name)),
/// });
///
/// let mut buf = [0u8; 128];
/// let mut host = empty_hostent();
/// lookup.by_name("foo", &mut buf, &mut host).unwrap();
/// assert_eq!(host.h_length, 4);
/// ```
#[derive(Debug, Clone)]
pub struct Lookup<R> {
    resolver: R,
}

impl Lookup<CommandResolver> {
    /// Builds a subprocess-backed lookup from the config file at `path`.
    ///
    /// # Errors
    ///
    /// Returns [`NssError::Io`] or [`NssError::InvalidConfig`] if the file
    /// exists but cannot be used.
    pub fn from_config_file(path: impl AsRef<Path>) -> Result<Self> {
        Ok(Self::new(CommandResolver::new(BackendConfig::load(path)?)))
    }
}

impl<R: Resolve> Lookup<R> {
    #[must_use]
    pub const fn new(resolver: R) -> Self {
        Self { resolver }
    }

    /// Returns the backend.
    #[must_use]
    pub const fn resolver(&self) -> &R {
        &self.resolver
    }

    /// Resolves `name` in `family` and packs the answer into `buf`/`host`.
    ///
    /// Only [`AddressFamily::Inet`] is serviced; other families fail before
    /// the backend is consulted.
    ///
    /// # Errors
    ///
    /// Returns [`NssError::AddressFamilyUnsupported`], any backend error, or
    /// [`NssError::BufferTooSmall`] if `buf` cannot hold the result.
    pub fn by_name_and_family(
        &self,
        name: &str,
        family: AddressFamily,
        buf: &mut [u8],
        host: &mut libc::hostent,
    ) -> Result<HostentLayout> {
        require_inet(family)?;

        let addr: Ipv4Addr = self.resolver.resolve(name).inspect_err(|e| {
            tracing::debug!(name = %name, error = %e, "Backend query failed");
        })?;

        let layout = encoder::encode(buf, name, addr, host).inspect_err(|e| {
            tracing::debug!(name = %name, error = %e, "Encoding failed");
        })?;

        tracing::debug!(name = %name, %addr, "Resolved");
        Ok(layout)
    }

    /// [`by_name_and_family`](Self::by_name_and_family) fixed to IPv4.
    ///
    /// # Errors
    ///
    /// Same as [`by_name_and_family`](Self::by_name_and_family).
    pub fn by_name(
        &self,
        name: &str,
        buf: &mut [u8],
        host: &mut libc::hostent,
    ) -> Result<HostentLayout> {
        self.by_name_and_family(name, AddressFamily::Inet, buf, host)
    }

    /// Reverse lookup. Never succeeds.
    ///
    /// # Errors
    ///
    /// Returns [`NssError::InvalidArgument`] if `addr` is not a 4-byte IPv4
    /// address, otherwise [`NssError::NotImplemented`].
    #[allow(clippy::unused_self)]
    pub fn by_address(&self, addr: &[u8], family: AddressFamily) -> Result<HostentLayout> {
        by_address(addr, family)
    }
}

/// Fails unless `family` is the one family this module serves.
///
/// # Errors
///
/// Returns [`NssError::AddressFamilyUnsupported`] for anything but
/// [`AddressFamily::Inet`].
pub fn require_inet(family: AddressFamily) -> Result<()> {
    if family != AddressFamily::Inet {
        tracing::debug!(?family, "Unsupported address family");
        return Err(NssError::AddressFamilyUnsupported(family.into()));
    }
    Ok(())
}

/// Reverse lookup without a backend. Never succeeds.
///
/// # Errors
///
/// Returns [`NssError::InvalidArgument`] if `addr` is not a 4-byte IPv4
/// address, otherwise [`NssError::NotImplemented`].
pub fn by_address(addr: &[u8], family: AddressFamily) -> Result<HostentLayout> {
    if family != AddressFamily::Inet {
        return Err(NssError::InvalidArgument("reverse lookup family must be AF_INET"));
    }
    if addr.len() != 4 {
        return Err(NssError::InvalidArgument("reverse lookup address must be 4 bytes"));
    }
    tracing::debug!(?addr, "Reverse lookup requested");
    Err(NssError::NotImplemented)
}
