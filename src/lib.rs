//! # nss-etcd
//!
//! A glibc NSS `hosts` module that resolves hostnames to IPv4 addresses by
//! reading keys from etcd instead of DNS or `/etc/hosts`.
//!
//! For every lookup the module runs `etcdctl get /hosts/<name>`, reads the
//! single dotted-quad line it prints, and packs the answer into the buffer
//! glibc supplies. No state is kept between lookups.
//!
//! ## Installation
//!
//! ```bash
//! cargo build --release
//! sudo cp target/release/libnss_etcd.so /lib/x86_64-linux-gnu/libnss_etcd.so.2
//! ```
//!
//! Then add `etcd` to the `hosts` line of `/etc/nsswitch.conf`:
//!
//! ```text
//! hosts: files etcd dns
//! ```
//!
//! ## Configuration
//!
//! `/etc/nss-etcd.conf` is optional; see [`BackendConfig::parse`] for the
//! format. Without it the module runs `etcdctl get` under `/hosts/` with a
//! 5 second deadline.
//!
//! ## Using the lookup from Rust
//!
//! ```rust,ignore
//! use nss_etcd::{Lookup, encoder::empty_hostent};
//!
//! let lookup = Lookup::from_config_file("/etc/nss-etcd.conf")?;
//! let mut buf = [0u8; 1024];
//! let mut host = empty_hostent();
//! lookup.by_name("db1", &mut buf, &mut host)?;
//! ```
//!
//! ## Verification
//!
//! ```bash
//! etcdctl put /hosts/db1 10.0.0.5
//! getent ahostsv4 db1
//! ```
//!
//! Reverse lookups (`getent hosts 10.0.0.5`) and IPv6 are not served.

#![warn(clippy::all, clippy::pedantic, clippy::nursery)]
#![allow(clippy::module_name_repetitions)]

pub mod backend;
pub mod config;
pub mod encoder;
pub mod error;
pub mod ffi;
pub mod lookup;
pub mod util;

pub use backend::{CommandResolver, Resolve};
pub use config::BackendConfig;
pub use encoder::HostentLayout;
pub use error::{NssError, NssStatus, Outcome, Result};
pub use lookup::{AddressFamily, Lookup};
