//! glibc NSS entry points.
//!
//! glibc finds these by name after `dlopen("libnss_etcd.so.2")` when
//! `/etc/nsswitch.conf` lists `etcd` for `hosts`. Each one only translates
//! the C calling convention into a [`Lookup`] call and back.

use std::ffi::{CStr, c_void};
use std::path::Path;

use libc::{c_char, c_int, size_t, socklen_t};

use crate::config::DEFAULT_CONFIG_PATH;
use crate::error::{NssError, NssStatus, Outcome, Result};
use crate::lookup::{self, AddressFamily, Lookup};

/// Writes `outcome` through the caller's out-parameters and returns its status.
///
/// # Safety
///
/// Non-null pointers must be valid for writes.
unsafe fn report(outcome: Outcome, errnop: *mut c_int, h_errnop: *mut c_int) -> NssStatus {
    if outcome.status != NssStatus::Success {
        if !errnop.is_null() {
            // SAFETY: caller-provided out-parameter pointer.
            unsafe { *errnop = outcome.errno };
        }
        if !h_errnop.is_null() {
            // SAFETY: caller-provided out-parameter pointer.
            unsafe { *h_errnop = outcome.h_errno };
        }
    }
    outcome.status
}

fn to_outcome<T>(result: Result<T>) -> Outcome {
    result.map_or_else(|e| e.outcome(), |_| Outcome::SUCCESS)
}

/// Forward lookup shared by the `gethostbyname*_r` entry points.
///
/// The family is checked before the name or `config` are looked at, so an
/// unsupported family is reported the same way whatever state the backend
/// configuration is in.
///
/// # Safety
///
/// Pointers follow the `gethostbyname2_r` NSS contract.
unsafe fn host_by_name(
    config: &Path,
    name: *const c_char,
    af: c_int,
    result: *mut libc::hostent,
    buffer: *mut c_char,
    buflen: size_t,
) -> Result<()> {
    if name.is_null() || result.is_null() || (buffer.is_null() && buflen != 0) {
        return Err(NssError::InvalidArgument("null pointer"));
    }
    let family = AddressFamily::from(af);
    lookup::require_inet(family)?;

    // SAFETY: glibc passes a NUL-terminated hostname.
    let name = unsafe { CStr::from_ptr(name) }
        .to_str()
        .map_err(|_| NssError::InvalidArgument("hostname is not UTF-8"))?;
    let buf: &mut [u8] = if buflen == 0 {
        &mut []
    } else {
        // SAFETY: glibc hands us `buflen` writable bytes at `buffer`.
        unsafe { std::slice::from_raw_parts_mut(buffer.cast::<u8>(), buflen) }
    };
    // SAFETY: `result` is a caller-owned hostent.
    let host = unsafe { &mut *result };

    Lookup::from_config_file(config)?.by_name_and_family(name, family, buf, host)?;
    Ok(())
}

/// `gethostbyname2_r` backend.
///
/// # Safety
///
/// Called by glibc with pointers valid per the NSS module contract.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn _nss_etcd_gethostbyname2_r(
    name: *const c_char,
    af: c_int,
    result: *mut libc::hostent,
    buffer: *mut c_char,
    buflen: size_t,
    errnop: *mut c_int,
    h_errnop: *mut c_int,
) -> NssStatus {
    // SAFETY: forwarded from our caller unchanged.
    let outcome = to_outcome(unsafe {
        host_by_name(
            Path::new(DEFAULT_CONFIG_PATH),
            name,
            af,
            result,
            buffer,
            buflen,
        )
    });
    // SAFETY: forwarded from our caller unchanged.
    unsafe { report(outcome, errnop, h_errnop) }
}

/// `gethostbyname_r` backend; IPv4 only.
///
/// # Safety
///
/// Called by glibc with pointers valid per the NSS module contract.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn _nss_etcd_gethostbyname_r(
    name: *const c_char,
    result: *mut libc::hostent,
    buffer: *mut c_char,
    buflen: size_t,
    errnop: *mut c_int,
    h_errnop: *mut c_int,
) -> NssStatus {
    // SAFETY: same contract as gethostbyname2_r.
    unsafe {
        _nss_etcd_gethostbyname2_r(
            name,
            libc::AF_INET,
            result,
            buffer,
            buflen,
            errnop,
            h_errnop,
        )
    }
}

/// `gethostbyaddr_r` backend. Reverse lookups are not supported.
///
/// # Safety
///
/// Called by glibc with pointers valid per the NSS module contract.
#[unsafe(no_mangle)]
#[allow(clippy::too_many_arguments)]
pub unsafe extern "C" fn _nss_etcd_gethostbyaddr_r(
    addr: *const c_void,
    len: socklen_t,
    af: c_int,
    _result: *mut libc::hostent,
    _buffer: *mut c_char,
    _buflen: size_t,
    errnop: *mut c_int,
    h_errnop: *mut c_int,
) -> NssStatus {
    let bytes: &[u8] = if addr.is_null() {
        &[]
    } else {
        // SAFETY: glibc passes `len` readable bytes at `addr`.
        unsafe { std::slice::from_raw_parts(addr.cast::<u8>(), len as usize) }
    };
    let outcome = to_outcome(lookup::by_address(bytes, AddressFamily::from(af)));
    // SAFETY: forwarded from our caller unchanged.
    unsafe { report(outcome, errnop, h_errnop) }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::encoder::empty_hostent;
    use crate::error::{HOST_NOT_FOUND, NETDB_INTERNAL, NO_DATA, NO_RECOVERY};
    use std::ptr;

    fn call_byname2(name: &CStr, af: c_int, buf: &mut [u8]) -> (NssStatus, c_int, c_int) {
        let mut host = empty_hostent();
        let (mut errno, mut h_errno) = (0, 0);
        // SAFETY: all pointers reference live locals.
        let status = unsafe {
            _nss_etcd_gethostbyname2_r(
                name.as_ptr(),
                af,
                &raw mut host,
                buf.as_mut_ptr().cast(),
                buf.len(),
                &raw mut errno,
                &raw mut h_errno,
            )
        };
        (status, errno, h_errno)
    }

    #[test]
    fn ipv6_is_unavailable() {
        let mut buf = [0u8; 128];
        let (status, errno, h_errno) = call_byname2(c"foo", libc::AF_INET6, &mut buf);
        assert_eq!(status, NssStatus::Unavail);
        assert_eq!(errno, libc::EAFNOSUPPORT);
        assert_eq!(h_errno, NO_DATA);
    }

    /// Drives the adapter against the config file at `config`, the way the
    /// exported entry points drive it against the system one.
    fn call_with_config(
        config: &Path,
        name: &CStr,
        af: c_int,
        buf: &mut [u8],
        host: &mut libc::hostent,
    ) -> (NssStatus, c_int, c_int) {
        let (mut errno, mut h_errno) = (-7, -7);
        let buffer = if buf.is_empty() {
            ptr::null_mut()
        } else {
            buf.as_mut_ptr().cast()
        };
        // SAFETY: all pointers reference live locals.
        let status = unsafe {
            let outcome =
                to_outcome(host_by_name(config, name.as_ptr(), af, host, buffer, buf.len()));
            report(outcome, &raw mut errno, &raw mut h_errno)
        };
        (status, errno, h_errno)
    }

    /// Writes a config whose backend answers `10.0.0.5` for `/hosts/foo`.
    fn fake_backend(dir: &Path) -> std::path::PathBuf {
        let script = dir.join("backend.sh");
        std::fs::write(
            &script,
            "case \"$1\" in /hosts/foo) echo 10.0.0.5 ;; *) exit 1 ;; esac\n",
        )
        .unwrap();
        let config = dir.join("nss-etcd.conf");
        std::fs::write(
            &config,
            format!("command /bin/sh\nargs {}\n", script.display()),
        )
        .unwrap();
        config
    }

    #[test]
    fn success_fills_hostent_through_raw_pointers() {
        let dir = tempfile::tempdir().unwrap();
        let config = fake_backend(dir.path());
        let mut buf = [0u8; 128];
        let mut host = empty_hostent();

        let (status, errno, h_errno) =
            call_with_config(&config, c"foo", libc::AF_INET, &mut buf, &mut host);
        assert_eq!(status, NssStatus::Success);
        assert_eq!((errno, h_errno), (-7, -7));

        let start = buf.as_ptr() as usize;
        assert!((start..start + buf.len()).contains(&(host.h_name as usize)));
        // SAFETY: `host` was filled from `buf`, which is still alive.
        let (name, octets) = unsafe {
            (
                CStr::from_ptr(host.h_name).to_str().unwrap().to_string(),
                *(*host.h_addr_list).cast::<[u8; 4]>(),
            )
        };
        assert_eq!(name, "foo");
        assert_eq!(octets, [10, 0, 0, 5]);
    }

    #[test]
    fn missing_host_is_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let config = fake_backend(dir.path());
        let mut buf = [0u8; 128];
        let mut host = empty_hostent();
        assert_eq!(
            call_with_config(&config, c"nope", libc::AF_INET, &mut buf, &mut host),
            (NssStatus::NotFound, libc::ENOENT, HOST_NOT_FOUND)
        );
    }

    #[test]
    fn undersized_buffer_asks_glibc_to_retry() {
        let dir = tempfile::tempdir().unwrap();
        let config = fake_backend(dir.path());
        let mut buf = [0xA5u8; 32];
        let mut host = empty_hostent();

        assert_eq!(
            call_with_config(&config, c"foo", libc::AF_INET, &mut buf[..6], &mut host),
            (NssStatus::TryAgain, libc::ERANGE, NETDB_INTERNAL)
        );
        assert!(buf.iter().all(|&b| b == 0xA5));
        assert!(host.h_name.is_null());
    }

    #[test]
    fn zero_length_null_buffer_is_too_small() {
        let dir = tempfile::tempdir().unwrap();
        let config = fake_backend(dir.path());
        let mut host = empty_hostent();
        assert_eq!(
            call_with_config(&config, c"foo", libc::AF_INET, &mut [], &mut host),
            (NssStatus::TryAgain, libc::ERANGE, NETDB_INTERNAL)
        );
    }

    #[test]
    fn ipv6_wins_over_broken_config() {
        let dir = tempfile::tempdir().unwrap();
        let config = dir.path().join("nss-etcd.conf");
        std::fs::write(&config, "timeout_ms forever\n").unwrap();
        let mut buf = [0u8; 128];
        let mut host = empty_hostent();

        assert_eq!(
            call_with_config(&config, c"foo", libc::AF_INET6, &mut buf, &mut host),
            (NssStatus::Unavail, libc::EAFNOSUPPORT, NO_DATA)
        );
        assert_eq!(
            call_with_config(&config, c"\xff\xfe", libc::AF_INET6, &mut buf, &mut host),
            (NssStatus::Unavail, libc::EAFNOSUPPORT, NO_DATA)
        );
        // The same config is rejected once the family is acceptable.
        assert_eq!(
            call_with_config(&config, c"foo", libc::AF_INET, &mut buf, &mut host),
            (NssStatus::Unavail, libc::EINVAL, NO_RECOVERY)
        );
    }

    #[test]
    fn null_name_is_invalid() {
        let mut host = empty_hostent();
        let mut buf = [0u8; 64];
        let (mut errno, mut h_errno) = (0, 0);
        // SAFETY: null name is handled before any dereference.
        let status = unsafe {
            _nss_etcd_gethostbyname_r(
                ptr::null(),
                &raw mut host,
                buf.as_mut_ptr().cast(),
                buf.len(),
                &raw mut errno,
                &raw mut h_errno,
            )
        };
        assert_eq!(status, NssStatus::Unavail);
        assert_eq!(errno, libc::EINVAL);
        assert_eq!(h_errno, NO_RECOVERY);
    }

    fn call_byaddr(addr: &[u8], af: c_int) -> (NssStatus, c_int, c_int) {
        let mut host = empty_hostent();
        let mut buf = [0u8; 64];
        let (mut errno, mut h_errno) = (0, 0);
        // SAFETY: all pointers reference live locals.
        let status = unsafe {
            _nss_etcd_gethostbyaddr_r(
                addr.as_ptr().cast(),
                socklen_t::try_from(addr.len()).unwrap(),
                af,
                &raw mut host,
                buf.as_mut_ptr().cast(),
                buf.len(),
                &raw mut errno,
                &raw mut h_errno,
            )
        };
        (status, errno, h_errno)
    }

    #[test]
    fn reverse_lookup_is_not_supported() {
        assert_eq!(
            call_byaddr(&[10, 0, 0, 5], libc::AF_INET),
            (NssStatus::Unavail, libc::EAFNOSUPPORT, NO_DATA)
        );
    }

    #[test]
    fn reverse_lookup_validates_arguments() {
        assert_eq!(
            call_byaddr(&[10, 0, 0], libc::AF_INET),
            (NssStatus::Unavail, libc::EINVAL, NO_RECOVERY)
        );
        assert_eq!(
            call_byaddr(&[0; 16], libc::AF_INET6),
            (NssStatus::Unavail, libc::EINVAL, NO_RECOVERY)
        );
    }

    #[test]
    fn success_leaves_error_slots_alone() {
        let (mut errno, mut h_errno) = (7, 9);
        // SAFETY: pointers reference live locals.
        let status = unsafe { report(Outcome::SUCCESS, &raw mut errno, &raw mut h_errno) };
        assert_eq!(status, NssStatus::Success);
        assert_eq!((errno, h_errno), (7, 9));
    }
}
