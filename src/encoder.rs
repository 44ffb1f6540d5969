//! Packs a resolved name and address into the caller's buffer.
//!
//! NSS modules may not allocate: every pointer in the returned `hostent`
//! must point into the buffer glibc hands us. The layout is
//!
//! ```text
//! name\0 | pad | aliases[0] = NULL | addr[4] | pad | addr_list[0] = &addr, addr_list[1] = NULL
//! ```
//!
//! with each field after the name aligned to the pointer size.

use std::mem::{align_of, size_of};
use std::net::Ipv4Addr;
use std::ptr;

use libc::{c_char, c_int};

use crate::error::{NssError, Result};

const PTR_SIZE: usize = size_of::<*mut c_char>();
const PTR_ALIGN: usize = align_of::<*mut c_char>();
const ADDR_LEN: usize = 4;
#[allow(clippy::cast_possible_wrap, clippy::cast_possible_truncation)]
const H_LENGTH: c_int = ADDR_LEN as c_int;

/// Byte offsets of every field inside the buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HostentLayout {
    pub name: usize,
    pub aliases: usize,
    pub addr: usize,
    pub addr_list: usize,
    /// One past the last byte written.
    pub end: usize,
}

impl HostentLayout {
    /// Computes the layout for a buffer starting at address `base` and
    /// checks that it fits in `buflen` bytes.
    ///
    /// Alignment is computed on absolute addresses, so pointer slots are
    /// aligned even when `base` is not.
    ///
    /// # Errors
    ///
    /// Returns [`NssError::BufferTooSmall`] if the layout does not fit.
    pub fn plan(base: usize, name_len: usize, buflen: usize) -> Result<Self> {
        let offsets = || {
            let align =
                |offset: usize| align_up(base.checked_add(offset)?, PTR_ALIGN).map(|a| a - base);
            let aliases = align(name_len.checked_add(1)?)?;
            let addr = aliases.checked_add(PTR_SIZE)?;
            let addr_list = align(addr.checked_add(ADDR_LEN)?)?;
            let end = addr_list.checked_add(2 * PTR_SIZE)?;
            Some((aliases, addr, addr_list, end))
        };
        let Some((aliases, addr, addr_list, end)) = offsets() else {
            return Err(NssError::BufferTooSmall {
                needed: usize::MAX,
                available: buflen,
            });
        };

        if end > buflen {
            return Err(NssError::BufferTooSmall {
                needed: end,
                available: buflen,
            });
        }

        Ok(Self {
            name: 0,
            aliases,
            addr,
            addr_list,
            end,
        })
    }
}

fn align_up(addr: usize, align: usize) -> Option<usize> {
    Some(addr.checked_add(align - 1)? & !(align - 1))
}

/// Writes `name` and `addr` into `buf` and points `host` at them.
///
/// Either every field is written or nothing is: the bounds check happens
/// before the first byte is touched.
///
/// # Errors
///
/// Returns [`NssError::InvalidArgument`] if `name` contains a NUL byte, or
/// [`NssError::BufferTooSmall`] if `buf` cannot hold the layout.
pub fn encode(
    buf: &mut [u8],
    name: &str,
    addr: Ipv4Addr,
    host: &mut libc::hostent,
) -> Result<HostentLayout> {
    if name.as_bytes().contains(&0) {
        return Err(NssError::InvalidArgument("hostname contains NUL"));
    }

    let base = buf.as_mut_ptr();
    let layout = HostentLayout::plan(base as usize, name.len(), buf.len())?;

    buf[layout.name..layout.name + name.len()].copy_from_slice(name.as_bytes());
    buf[layout.name + name.len()] = 0;

    write_ptr(buf, layout.aliases, ptr::null_mut());

    buf[layout.addr..layout.addr + ADDR_LEN].copy_from_slice(&addr.octets());

    let addr_ptr = base.wrapping_add(layout.addr).cast::<c_char>();
    write_ptr(buf, layout.addr_list, addr_ptr);
    write_ptr(buf, layout.addr_list + PTR_SIZE, ptr::null_mut());

    host.h_name = base.wrapping_add(layout.name).cast();
    host.h_aliases = base.wrapping_add(layout.aliases).cast();
    host.h_addrtype = libc::AF_INET;
    host.h_length = H_LENGTH;
    host.h_addr_list = base.wrapping_add(layout.addr_list).cast();

    tracing::trace!(name = %name, %addr, bytes = layout.end, "Packed hostent");
    Ok(layout)
}

fn write_ptr(buf: &mut [u8], offset: usize, value: *mut c_char) {
    buf[offset..offset + PTR_SIZE].copy_from_slice(&(value as usize).to_ne_bytes());
}

/// Returns an all-null `hostent` for the caller to fill.
#[must_use]
pub const fn empty_hostent() -> libc::hostent {
    libc::hostent {
        h_name: ptr::null_mut(),
        h_aliases: ptr::null_mut(),
        h_addrtype: 0,
        h_length: 0,
        h_addr_list: ptr::null_mut(),
    }
}
