use std::fs;
use std::path::{Path, PathBuf};

use toml_edit::DocumentMut;
use tracing::info;

use crate::env::Environment;
use crate::error::{Error, Result};

/// Keys understood in the `[General]` table, in display order.
pub const KEYS: [&str; 4] = ["CXX", "CXXFLAGS", "LDFLAGS", "COMMON_INCLUDES"];

const TABLE: &str = "General";

/// Written to disk the first time cpi starts without a configuration file.
pub const DEFAULT_CONFIG: &str = r#"# cpi configuration
#
# Example:
#   CXX = "clang++"
#   CXXFLAGS = "-pipe -std=c++2a -O2 `pkg-config --cflags fmt`"
#   LDFLAGS = "-lpthread $(pkg-config --libs fmt)"
#   COMMON_INCLUDES = "vector map <cmath> \"mylib.h\""
#
# An empty CXX searches PATH for a compiler.

[General]
CXX = ""
CXXFLAGS = "-pipe -std=c++2a -D_REENTRANT"
LDFLAGS = ""
COMMON_INCLUDES = ""
"#;

fn default_value(key: &str) -> &'static str {
    match key {
        "CXXFLAGS" => "-pipe -std=c++2a -D_REENTRANT",
        _ => "",
    }
}

/// Persistent settings, read once per session.
#[derive(Debug, Clone)]
pub struct Config {
    path: PathBuf,
    doc: DocumentMut,
}

impl Config {
    /// `$XDG_CONFIG_HOME/cpi/cpi.conf`, else `$HOME/.config/cpi/cpi.conf`.
    pub fn default_path(env: &Environment) -> Option<PathBuf> {
        let base = env
            .get_var("XDG_CONFIG_HOME")
            .map(PathBuf::from)
            .or_else(|| env.get_var("HOME").map(|home| Path::new(&home).join(".config")))?;
        Some(base.join("cpi").join("cpi.conf"))
    }

    /// Read the file at `path`, creating it with [`DEFAULT_CONFIG`] first if
    /// it does not exist.
    pub fn load_or_create(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        if !path.exists() {
            if let Some(dir) = path.parent() {
                fs::create_dir_all(dir)?;
            }
            fs::write(&path, DEFAULT_CONFIG)?;
            info!(path = %path.display(), "created default configuration");
        }
        let text = fs::read_to_string(&path)?;
        Self::parse(path, &text)
    }

    /// Settings parsed from `text`; `path` is only used for messages.
    pub fn parse(path: impl Into<PathBuf>, text: &str) -> Result<Self> {
        let path = path.into();
        let doc: DocumentMut = text
            .parse()
            .map_err(|e: toml_edit::TomlError| Error::config(&path, e.message()))?;
        if let Some(table) = doc.get(TABLE) {
            for key in KEYS {
                if let Some(item) = table.get(key) {
                    if item.as_str().is_none() {
                        return Err(Error::config(&path, format!("{key} must be a string")));
                    }
                }
            }
        }
        Ok(Self { path, doc })
    }

    /// Built-in defaults, not backed by any file.
    pub fn builtin() -> Self {
        Self {
            path: PathBuf::new(),
            doc: DEFAULT_CONFIG.parse().unwrap_or_default(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Value of `key`, or its default when absent.
    pub fn get(&self, key: &str) -> &str {
        self.doc
            .get(TABLE)
            .and_then(|table| table.get(key))
            .and_then(|item| item.as_str())
            .unwrap_or_else(|| default_value(key))
    }

    pub fn cxx(&self) -> &str {
        self.get("CXX").trim()
    }

    pub fn cxxflags(&self) -> &str {
        self.get("CXXFLAGS")
    }

    pub fn ldflags(&self) -> &str {
        self.get("LDFLAGS")
    }

    /// `COMMON_INCLUDES` turned into header lines.
    pub fn common_includes(&self) -> Vec<String> {
        self.get("COMMON_INCLUDES")
            .split_whitespace()
            .map(|entry| {
                if entry.starts_with('<') || entry.starts_with('"') {
                    format!("#include {entry}")
                } else {
                    format!("#include <{entry}>")
                }
            })
            .collect()
    }

    /// All keys with their effective values, in display order.
    pub fn entries(&self) -> impl Iterator<Item = (&'static str, &str)> {
        KEYS.into_iter().map(|key| (key, self.get(key)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_path_prefers_xdg() {
        let env = Environment::from_vars([("XDG_CONFIG_HOME", "/x"), ("HOME", "/home/u")]);
        assert_eq!(
            Config::default_path(&env),
            Some(PathBuf::from("/x/cpi/cpi.conf"))
        );
        let env = Environment::from_vars([("HOME", "/home/u")]);
        assert_eq!(
            Config::default_path(&env),
            Some(PathBuf::from("/home/u/.config/cpi/cpi.conf"))
        );
        assert_eq!(Config::default_path(&Environment::default()), None);
    }

    #[test]
    fn test_missing_file_is_created_with_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("cpi.conf");

        let config = Config::load_or_create(&path).unwrap();
        assert_eq!(fs::read_to_string(&path).unwrap(), DEFAULT_CONFIG);
        assert_eq!(config.path(), path);
        assert_eq!(config.cxx(), "");
        assert_eq!(config.cxxflags(), "-pipe -std=c++2a -D_REENTRANT");
        assert_eq!(config.ldflags(), "");
        assert!(config.common_includes().is_empty());
    }

    #[test]
    fn test_existing_file_is_not_rewritten() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cpi.conf");
        let text = "# mine\n[General]\nCXX = \"clang++\"\nLDFLAGS = \"-lm\"\n";
        fs::write(&path, text).unwrap();

        let config = Config::load_or_create(&path).unwrap();
        assert_eq!(fs::read_to_string(&path).unwrap(), text);
        assert_eq!(config.cxx(), "clang++");
        assert_eq!(config.ldflags(), "-lm");
        // Absent keys fall back to their defaults.
        assert_eq!(config.cxxflags(), "-pipe -std=c++2a -D_REENTRANT");
    }

    #[test]
    fn test_common_includes_become_headers() {
        let config = Config::parse(
            "t",
            "[General]\nCOMMON_INCLUDES = \"vector  <cmath> \\\"local.h\\\"\"\n",
        )
        .unwrap();
        assert_eq!(
            config.common_includes(),
            vec![
                "#include <vector>".to_string(),
                "#include <cmath>".to_string(),
                "#include \"local.h\"".to_string(),
            ]
        );
    }

    #[test]
    fn test_non_string_value_is_rejected() {
        let err = Config::parse("bad.conf", "[General]\nCXXFLAGS = 3\n").unwrap_err();
        assert!(err.to_string().contains("CXXFLAGS must be a string"), "{err}");
        assert!(Config::parse("bad.conf", "[General\n").is_err());
    }

    #[test]
    fn test_entries_follow_key_order() {
        let config = Config::builtin();
        let keys: Vec<_> = config.entries().map(|(k, _)| k).collect();
        assert_eq!(keys, KEYS);
    }
}
