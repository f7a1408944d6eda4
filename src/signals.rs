//! Process signal handling.
//!
//! Handlers only raise flags; the event loop acts on them between events.
//! SIGTERM, SIGINT and SIGHUP are installed without SA_RESTART so that a
//! blocked wait for X events returns early.

use std::sync::atomic::{AtomicBool, Ordering};

use anyhow::Result;

static SHUTDOWN: AtomicBool = AtomicBool::new(false);
static RELOAD_MENU: AtomicBool = AtomicBool::new(false);

extern "C" fn on_signal(signal: libc::c_int) {
    match signal {
        libc::SIGTERM | libc::SIGINT => SHUTDOWN.store(true, Ordering::SeqCst),
        libc::SIGHUP => RELOAD_MENU.store(true, Ordering::SeqCst),
        libc::SIGCHLD => {
            // Reap every exited launcher child
            while unsafe { libc::waitpid(-1, std::ptr::null_mut(), libc::WNOHANG) } > 0 {}
        }
        _ => {}
    }
}

fn install(signal: libc::c_int, flags: libc::c_int) -> Result<()> {
    unsafe {
        let mut action: libc::sigaction = std::mem::zeroed();
        action.sa_sigaction = on_signal as extern "C" fn(libc::c_int) as libc::sighandler_t;
        action.sa_flags = flags;
        libc::sigemptyset(&mut action.sa_mask);
        if libc::sigaction(signal, &action, std::ptr::null_mut()) != 0 {
            return Err(std::io::Error::last_os_error().into());
        }
    }
    Ok(())
}

/// Install the labwm signal handlers.
pub fn install_handlers() -> Result<()> {
    install(libc::SIGTERM, 0)?;
    install(libc::SIGINT, 0)?;
    install(libc::SIGHUP, 0)?;
    install(libc::SIGCHLD, libc::SA_NOCLDSTOP | libc::SA_RESTART)?;

    // Children may have exited before the handler existed
    while unsafe { libc::waitpid(-1, std::ptr::null_mut(), libc::WNOHANG) } > 0 {}
    Ok(())
}

pub fn shutdown_requested() -> bool {
    SHUTDOWN.load(Ordering::SeqCst)
}

/// Consume a pending menu reload request
pub fn take_menu_reload() -> bool {
    RELOAD_MENU.swap(false, Ordering::SeqCst)
}
