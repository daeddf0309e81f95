use std::borrow::Cow;
use std::ffi::OsStr;
use std::path::{Path, PathBuf};

use tracing::{debug, info};

use crate::env::Environment;
use crate::error::{Error, Result};

/// Compilers tried, in order, when none is configured.
#[cfg(target_os = "macos")]
pub const COMPILER_CANDIDATES: &[&str] = &["clang++", "g++"];
#[cfg(not(target_os = "macos"))]
pub const COMPILER_CANDIDATES: &[&str] = &["g++", "clang++"];

/// Resolve the compiler to use.
///
/// An empty `configured` value means "search `PATH` for the usual
/// candidates"; anything else is resolved like a shell would resolve a
/// command name.
pub fn locate_compiler(configured: &str, env: &Environment) -> Result<PathBuf> {
    let search_paths = env.get_var("PATH").unwrap_or_default();
    let search_paths = OsStr::new(&search_paths);
    let configured = configured.trim();

    let found = if configured.is_empty() {
        COMPILER_CANDIDATES
            .iter()
            .find_map(|name| find_command_path(search_paths, Path::new(name)))
            .map(Cow::into_owned)
    } else {
        find_command_path(search_paths, Path::new(configured)).map(Cow::into_owned)
    };

    match found {
        Some(path) => {
            info!(compiler = %path.display(), "resolved compiler");
            Ok(path)
        }
        None => {
            debug!(configured, "no compiler found");
            Err(Error::ToolchainNotFound {
                configured: configured.to_string(),
            })
        }
    }
}

/// Resolve a command path the way a typical shell would.
///
/// Behavior:
/// - Absolute path: returns it if it exists.
/// - Relative with multiple components (e.g., `bin/sh`): returns it if it exists.
/// - `./foo` on Unix or any `./`-prefixed path on other platforms: returns it if it exists.
/// - Single path component (no separators): search each directory in `search_paths` (PATH)
///   and return the first existing match.
/// - Empty path: returns `None`.
pub fn find_command_path<'a>(search_paths: &OsStr, path: &'a Path) -> Option<Cow<'a, Path>> {
    if path.is_absolute() {
        return find_by_path(path).map(Cow::Borrowed);
    }

    let search_in_current_dir = cfg!(not(unix)) || path.starts_with("./");
    if search_in_current_dir && path.exists() {
        return Some(Cow::Borrowed(path));
    }

    let mut components = path.components();
    match (components.next(), components.next()) {
        (None, None) => None,
        (Some(x), None) => find_in_path(search_paths, x.as_os_str()).map(Cow::Owned),
        _ => find_by_path(path).map(Cow::Borrowed),
    }
}

fn find_in_path(search_paths: &OsStr, cmd: &OsStr) -> Option<PathBuf> {
    std::env::split_paths(search_paths)
        .map(|dir| dir.join(cmd))
        .find(|path| path.is_file())
}

fn find_by_path(path: &Path) -> Option<&Path> {
    if path.is_file() { Some(path) } else { None }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs::{self, File};

    fn osstr(s: &str) -> &OsStr {
        OsStr::new(s)
    }

    fn env_with_path(path: &Path) -> Environment {
        Environment::from_vars([("PATH", path.to_string_lossy().into_owned())])
    }

    #[test]
    #[cfg(unix)]
    fn absolute_existing() {
        let path = Path::new("/bin/sh");
        let found = find_command_path(osstr("/nowhere"), path).expect("find /bin/sh");
        assert_eq!(found.as_ref(), path);
    }

    #[test]
    #[cfg(unix)]
    fn absolute_nonexisting() {
        assert!(find_command_path(osstr("/bin"), Path::new("/bin/nonexisting")).is_none());
    }

    #[test]
    #[cfg(unix)]
    fn single_component_found_in_path() {
        let found = find_command_path(osstr("/nowhere:/bin"), Path::new("sh"))
            .expect("Expected to find 'sh' in /bin via PATH search");
        assert!(found.as_ref().starts_with("/bin"), "got {:?}", found);
    }

    #[test]
    fn directory_is_not_a_command() {
        let dir = tempfile::tempdir().expect("tempdir");
        fs::create_dir(dir.path().join("g++")).expect("mkdir");
        assert!(find_command_path(dir.path().as_os_str(), Path::new("g++")).is_none());
    }

    #[test]
    fn empty_path_is_none() {
        assert!(find_command_path(osstr("/bin"), Path::new("")).is_none());
    }

    #[test]
    fn candidates_are_searched_in_order() {
        let dir = tempfile::tempdir().expect("tempdir");
        for name in COMPILER_CANDIDATES {
            File::create(dir.path().join(name)).expect("touch");
        }
        let found = locate_compiler("", &env_with_path(dir.path())).expect("compiler");
        assert_eq!(found, dir.path().join(COMPILER_CANDIDATES[0]));

        fs::remove_file(dir.path().join(COMPILER_CANDIDATES[0])).expect("rm");
        let found = locate_compiler("", &env_with_path(dir.path())).expect("compiler");
        assert_eq!(found, dir.path().join(COMPILER_CANDIDATES[1]));
    }

    #[test]
    fn configured_compiler_is_resolved_through_path() {
        let dir = tempfile::tempdir().expect("tempdir");
        File::create(dir.path().join("my-cxx")).expect("touch");
        let found = locate_compiler(" my-cxx ", &env_with_path(dir.path())).expect("compiler");
        assert_eq!(found, dir.path().join("my-cxx"));
    }

    #[test]
    fn missing_compiler_is_reported() {
        let dir = tempfile::tempdir().expect("tempdir");
        let err = locate_compiler("nope++", &env_with_path(dir.path())).unwrap_err();
        assert!(matches!(err, Error::ToolchainNotFound { .. }));
        assert_eq!(err.to_string(), "Compiler not found. nope++");
    }
}
