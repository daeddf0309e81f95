//! Shell-style command substitution inside compile option strings.
//!
//! `` `pkg-config --cflags foo` `` and `$(pkg-config --libs foo)` are replaced
//! by the trimmed standard output of the command. Commands are split on
//! whitespace and run directly, never through a shell. A command that cannot
//! be started or exits non-zero expands to nothing.

use std::ffi::OsStr;
use std::ops::Range;
use std::path::Path;
use std::process::{Command, Stdio};
use std::sync::LazyLock;

use regex::Regex;
use tracing::{debug, warn};

use crate::env::Environment;
use crate::error::{Error, Result};
use crate::locate::find_command_path;

/// Upper bound on expansions per string; output that keeps producing new
/// substitutions would otherwise loop forever.
pub const MAX_EXPANSIONS: usize = 64;

static PATTERNS: LazyLock<[Regex; 2]> = LazyLock::new(|| {
    [r"`([^`]+)`", r"\$\(([^\)]+)\)"]
        .map(|p| Regex::new(p).unwrap_or_else(|e| unreachable!("invalid pattern: {e}")))
});

/// Expand every substitution in `options`.
///
/// Backtick forms are tried first, then `$()` forms. After each replacement
/// the string is matched again from the start, so output that itself
/// contains either form is expanded too.
pub fn expand(options: &str, env: &Environment) -> Result<String> {
    let mut options = options.to_string();
    let mut expansions = 0;
    while let Some((range, command)) = next_substitution(&options) {
        if expansions == MAX_EXPANSIONS {
            return Err(Error::SubstitutionLimit(MAX_EXPANSIONS));
        }
        expansions += 1;
        let output = run_capture(&command, env);
        options.replace_range(range, &output);
    }
    Ok(options)
}

/// Span and command of the first substitution, backticks before `$()`.
fn next_substitution(options: &str) -> Option<(Range<usize>, String)> {
    PATTERNS.iter().find_map(|re| {
        let caps = re.captures(options)?;
        Some((caps.get(0)?.range(), caps.get(1)?.as_str().to_string()))
    })
}

fn run_capture(command_line: &str, env: &Environment) -> String {
    let mut words = command_line.split_whitespace();
    let Some(program) = words.next() else {
        return String::new();
    };
    let search_paths = env.get_var("PATH").unwrap_or_default();
    let resolved = find_command_path(OsStr::new(&search_paths), Path::new(program))
        .map(|p| p.into_owned())
        .unwrap_or_else(|| program.into());

    debug!(command = command_line, "running substitution");
    let output = Command::new(&resolved)
        .args(words)
        .stdin(Stdio::null())
        .stderr(Stdio::inherit())
        .output();
    match output {
        Ok(out) if out.status.success() => String::from_utf8_lossy(&out.stdout).trim().to_string(),
        Ok(out) => {
            warn!(command = command_line, status = %out.status, "substitution failed");
            String::new()
        }
        Err(e) => {
            warn!(command = command_line, error = %e, "substitution could not start");
            String::new()
        }
    }
}
