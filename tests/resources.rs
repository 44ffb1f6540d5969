//! Descriptor and child-process hygiene across repeated lookups.
//!
//! Kept in its own test binary so no other test shares the process while
//! open descriptors and children are counted.

use std::time::Duration;

use nss_etcd::encoder::empty_hostent;
use nss_etcd::{BackendConfig, CommandResolver, Lookup};

fn open_fds() -> usize {
    std::fs::read_dir("/proc/self/fd").unwrap().count()
}

fn has_children() -> bool {
    // SAFETY: WNOHANG never blocks; a null status pointer is allowed.
    let rc = unsafe { libc::waitpid(-1, std::ptr::null_mut(), libc::WNOHANG) };
    rc != -1
}

#[test]
fn repeated_lookups_release_pipes_and_children() {
    let script = r#"case "$1" in
        /hosts/ok) echo 10.0.0.5 ;;
        /hosts/slow) sleep 5 ;;
        /hosts/chatty) i=0; while [ $i -lt 5000 ]; do echo 10.0.0.9; i=$((i+1)); done ;;
        *) exit 3 ;;
    esac"#;
    let lookup = Lookup::new(CommandResolver::new(
        BackendConfig::default()
            .with_program("/bin/sh")
            .with_args(["-c", script, "nss-etcd"])
            .with_timeout(Duration::from_millis(300)),
    ));

    let before = open_fds();
    for _ in 0..10 {
        for name in ["ok", "missing", "chatty", "slow"] {
            let mut buf = [0u8; 128];
            let mut host = empty_hostent();
            let _ = lookup.by_name(name, &mut buf, &mut host);
        }
    }

    assert_eq!(open_fds(), before);
    assert!(!has_children(), "a backend child was left unreaped");
}
