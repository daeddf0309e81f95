//! The transient executable produced on every turn.

use std::ffi::CString;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

use tracing::debug;

/// Process-unique location of the compiled program in the temp directory.
pub fn transient_path() -> PathBuf {
    let ext = if cfg!(windows) { "exe" } else { "out" };
    std::env::temp_dir().join(format!(".cpi{}.{ext}", std::process::id()))
}

/// Removes the artifact when dropped, whatever way the turn ended.
#[derive(Debug)]
pub struct ArtifactGuard {
    path: PathBuf,
}

impl ArtifactGuard {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for ArtifactGuard {
    fn drop(&mut self) {
        match fs::remove_file(&self.path) {
            Ok(()) => debug!(path = %self.path.display(), "removed artifact"),
            Err(e) if e.kind() == io::ErrorKind::NotFound => {}
            Err(e) => debug!(path = %self.path.display(), error = %e, "cannot remove artifact"),
        }
    }
}

static CLEANUP_PATH: OnceLock<CString> = OnceLock::new();

/// Make SIGINT and SIGTERM remove `path` before the process exits.
///
/// Only the first call has an effect.
#[cfg(unix)]
pub fn install_cleanup_handlers(path: &Path) -> io::Result<()> {
    use std::os::unix::ffi::OsStrExt;

    let c_path = CString::new(path.as_os_str().as_bytes())
        .map_err(|e| io::Error::new(io::ErrorKind::InvalidInput, e))?;
    if CLEANUP_PATH.set(c_path).is_err() {
        return Ok(());
    }

    // SAFETY: the handler only calls async-signal-safe functions (`unlink`,
    // `_exit`) on a path that is fully initialised before installation.
    unsafe {
        let mut sa: libc::sigaction = std::mem::zeroed();
        sa.sa_sigaction = cleanup_signal_handler as usize;
        sa.sa_flags = libc::SA_SIGINFO;
        libc::sigemptyset(&raw mut sa.sa_mask);

        for signal in [libc::SIGINT, libc::SIGTERM] {
            if libc::sigaction(signal, &raw const sa, std::ptr::null_mut()) != 0 {
                return Err(io::Error::last_os_error());
            }
        }
    }
    Ok(())
}

#[cfg(not(unix))]
pub fn install_cleanup_handlers(path: &Path) -> io::Result<()> {
    let _ = CLEANUP_PATH.set(CString::default());
    debug!(path = %path.display(), "signal cleanup unsupported on this platform");
    Ok(())
}

#[cfg(unix)]
extern "C" fn cleanup_signal_handler(
    _sig: libc::c_int,
    _info: *mut libc::siginfo_t,
    _ctx: *mut std::ffi::c_void,
) {
    if let Some(path) = CLEANUP_PATH.get() {
        // SAFETY: `path` is a valid NUL-terminated string that lives forever.
        unsafe {
            libc::unlink(path.as_ptr());
        }
    }
    // SAFETY: `_exit` is async-signal-safe and never returns.
    unsafe { libc::_exit(0) }
}
