//! Installs a small, known seccomp filter. Used by the real-process tests.
//!
//! Usage: `filterscope-fixture <seccomp|prctl> <address-file>`
//!
//! The address of the `sock_fprog` handed to the kernel is written to
//! `address-file` before the install call, so a supervisor can compare it
//! with the pointer it intercepted. The filter allows everything except
//! `getpid`, which fails with `EPERM`.

#![allow(unsafe_code, clippy::print_stderr)]

use std::process::ExitCode;

#[cfg(target_os = "linux")]
fn main() -> ExitCode {
    use filterscope_trace::signature::SECCOMP_MODE_FILTER;

    /// `SECCOMP_SET_MODE_FILTER` operation of `seccomp(2)`.
    const SET_MODE_FILTER: u64 = 1;

    let mut args = std::env::args().skip(1);
    let (Some(mode), Some(address_file)) = (args.next(), args.next()) else {
        eprintln!("usage: filterscope-fixture <seccomp|prctl> <address-file>");
        return ExitCode::FAILURE;
    };

    let mut filter = [
        libc::sock_filter { code: 0x20, jt: 0, jf: 0, k: 0 },
        libc::sock_filter { code: 0x15, jt: 0, jf: 1, k: 39 },
        libc::sock_filter { code: 0x06, jt: 0, jf: 0, k: 0x0005_0001 },
        libc::sock_filter { code: 0x06, jt: 0, jf: 0, k: 0x7fff_0000 },
    ];
    let prog = libc::sock_fprog {
        len: 4,
        filter: filter.as_mut_ptr(),
    };
    let prog_ptr = std::ptr::addr_of!(prog);

    if let Err(err) = std::fs::write(&address_file, (prog_ptr as usize).to_string()) {
        eprintln!("cannot write {address_file}: {err}");
        return ExitCode::FAILURE;
    }

    // SAFETY: `prog` and `filter` outlive both calls, and the kernel only
    // reads through the pointer.
    let rc = unsafe {
        if libc::prctl(libc::PR_SET_NO_NEW_PRIVS, 1_u64, 0_u64, 0_u64, 0_u64) != 0 {
            eprintln!("PR_SET_NO_NEW_PRIVS: {}", std::io::Error::last_os_error());
            return ExitCode::FAILURE;
        }
        match mode.as_str() {
            "seccomp" => libc::syscall(libc::SYS_seccomp, SET_MODE_FILTER, 0_u64, prog_ptr),
            "prctl" => libc::c_long::from(libc::prctl(
                libc::PR_SET_SECCOMP,
                SECCOMP_MODE_FILTER,
                prog_ptr,
            )),
            other => {
                eprintln!("unknown install call: {other}");
                return ExitCode::FAILURE;
            }
        }
    };
    if rc == 0 {
        ExitCode::SUCCESS
    } else {
        eprintln!("install failed: {}", std::io::Error::last_os_error());
        ExitCode::FAILURE
    }
}

#[cfg(not(target_os = "linux"))]
fn main() -> ExitCode {
    eprintln!("filterscope-fixture requires Linux");
    ExitCode::FAILURE
}
