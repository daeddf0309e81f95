//! Whole-program modes: `cpi file.cpp` and `cpi -`.
//!
//! The source is compiled as written, without synthesis. Files may carry
//! directives in line comments:
//!
//! ```text
//! // CompileOptions: -O2 `pkg-config --cflags --libs fmt`
//! // CXX: clang++
//! ```

use std::fs;
use std::io::Write;
use std::path::Path;
use std::sync::LazyLock;

use regex::Regex;

use crate::error::{Error, Result};
use crate::toolchain::{Backend, Outcome};

static COMPILE_OPTIONS: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)//\s*CompileOptions\s*:([^\n]*)")
        .unwrap_or_else(|e| unreachable!("invalid pattern: {e}"))
});

static COMPILER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"//\s*CXX\s*:([^\n]*)").unwrap_or_else(|e| unreachable!("invalid pattern: {e}"))
});

/// A complete program plus the directives found in it.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProgramSource {
    pub text: String,
    /// Raw `CompileOptions` value, before substitution.
    pub compile_options: Option<String>,
    /// `CXX` override, trimmed and non-empty.
    pub compiler: Option<String>,
}

impl ProgramSource {
    /// Parse a source file's contents.
    ///
    /// A `#!` first line is blanked so the compiler's line numbers still
    /// match the file.
    pub fn from_file_text(raw: &str) -> Self {
        let text = match raw.split_once('\n') {
            Some((first, rest)) if first.trim_start().starts_with("#!") => format!("\n{rest}"),
            None if raw.trim_start().starts_with("#!") => String::new(),
            _ => raw.to_string(),
        };
        let compile_options = COMPILE_OPTIONS
            .captures(&text)
            .and_then(|caps| caps.get(1))
            .map(|m| m.as_str().trim().to_string());
        let compiler = COMPILER
            .captures(&text)
            .and_then(|caps| caps.get(1))
            .map(|m| m.as_str().trim().to_string())
            .filter(|cxx| !cxx.is_empty());
        Self {
            text,
            compile_options,
            compiler,
        }
    }

    /// Source read from stdin: used as is, directives are not interpreted.
    pub fn from_stdin_text(raw: String) -> Self {
        Self {
            text: raw,
            ..Self::default()
        }
    }

    pub fn read(path: &Path) -> Result<Self> {
        let raw = fs::read_to_string(path).map_err(|source| Error::SourceUnreadable {
            path: path.to_path_buf(),
            source,
        })?;
        Ok(Self::from_file_text(&raw))
    }
}

/// Compile and run a whole program, returning the process exit code.
///
/// Compilation failure prints the raw diagnostics and yields 1; otherwise
/// the program's own exit code is returned.
pub fn run_program<B: Backend>(backend: &mut B, source: &str, out: &mut dyn Write) -> Result<i32> {
    match backend.compile_and_execute(source, None, out)? {
        Outcome::Executed(result) => Ok(result.exit_code()),
        Outcome::Rejected(attempt) => {
            write!(out, ">>> Compilation error\n{}", attempt.diagnostics)?;
            out.flush()?;
            Ok(1)
        }
    }
}
