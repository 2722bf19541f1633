// common.rs — console print layer used by the renderer and the tools
//
// Messages keep the engine console's trailing-newline convention; the
// newline is stripped before the text reaches the `log` facade.

use std::sync::atomic::{AtomicBool, Ordering};

use parking_lot::Mutex;

pub const MAXPRINTMSG: usize = 4096;

/// Distribution name and version (for tool banners and version strings)
pub const DISTNAME: &str = "xvk-lights";
pub const DISTVER: &str = env!("CARGO_PKG_VERSION");

// ============================================================
// Redirect buffer for Com_Printf
// ============================================================

static RD_BUFFER: Mutex<Option<String>> = Mutex::new(None);

/// Developer prints are emitted only while this is set (the `developer` cvar).
static DEVELOPER: AtomicBool = AtomicBool::new(false);

/// Begin redirecting console output into a buffer.
pub fn com_begin_redirect() {
    *RD_BUFFER.lock() = Some(String::new());
}

/// End redirect and return the captured output.
pub fn com_end_redirect() -> Option<String> {
    RD_BUFFER.lock().take()
}

pub fn com_set_developer(enabled: bool) {
    DEVELOPER.store(enabled, Ordering::Relaxed);
}

pub fn com_developer() -> bool {
    DEVELOPER.load(Ordering::Relaxed)
}

/// Append to the redirect buffer if one is active. Returns true if captured.
fn redirect(prefix: &str, msg: &str) -> bool {
    let mut buf = RD_BUFFER.lock();
    match *buf {
        Some(ref mut s) => {
            if s.len() + msg.len() < MAXPRINTMSG * 16 {
                s.push_str(prefix);
                s.push_str(msg);
            }
            true
        }
        None => false,
    }
}

// ============================================================
// Com_Printf / Com_DPrintf / warnings / errors
// ============================================================

/// General-purpose print.
pub fn com_printf(msg: &str) {
    if redirect("", msg) {
        return;
    }
    log::info!("{}", msg.trim_end_matches('\n'));
}

/// Developer-only print. Only prints when developer mode is active.
pub fn com_dprintf(msg: &str) {
    if !com_developer() {
        return;
    }
    if redirect("", msg) {
        return;
    }
    log::debug!("{}", msg.trim_end_matches('\n'));
}

/// Recoverable problem: processing continues with degraded output.
pub fn com_wprintf(msg: &str) {
    if redirect("WARNING: ", msg) {
        return;
    }
    log::warn!("{}", msg.trim_end_matches('\n'));
}

/// Error-class message. Printing never terminates the process; the caller
/// decides what a failure means.
pub fn com_eprintf(msg: &str) {
    if redirect("ERROR: ", msg) {
        return;
    }
    log::error!("{}", msg.trim_end_matches('\n'));
}

/// Serializes capture sessions so concurrent callers cannot interleave
/// their output in the shared redirect buffer.
static CAPTURE_LOCK: Mutex<()> = Mutex::new(());

/// Run `f` with console output redirected, returning its result and
/// everything it printed.
pub fn com_capture<R>(f: impl FnOnce() -> R) -> (R, String) {
    let _guard = CAPTURE_LOCK.lock();
    com_begin_redirect();
    let r = f();
    let out = com_end_redirect().unwrap_or_default();
    (r, out)
}
