use std::fmt;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use std::thread;

use tracing::{debug, info, warn};

use crate::artifact::ArtifactGuard;
use crate::config::Config;
use crate::env::Environment;
use crate::error::{Error, Result};
use crate::io_adapters::{ClosedInput, LineSource};
use crate::runner::{ProcessRunner, RunResult};
use crate::subst;
use crate::synth::Variant;

/// Language-mode flag implied by the compiler's file name.
///
/// The name is split on `-` so cross and versioned drivers
/// (`x86_64-linux-gnu-g++-13`, `clang++-17`) are recognised too.
pub fn language_flag(compiler: &Path) -> Option<&'static str> {
    let name = compiler.file_stem()?.to_str()?;
    let parts: Vec<&str> = name.split('-').collect();
    let any = |names: &[&str]| parts.iter().any(|part| names.contains(part));
    if any(&["clang++", "g++", "c++"]) {
        Some("-xc++")
    } else if any(&["clang", "gcc", "cc"]) {
        Some("-xc")
    } else {
        None
    }
}

fn is_link_flag(flag: &str) -> bool {
    flag.to_ascii_lowercase().starts_with("-l") || flag.starts_with("-Wl,")
}

/// Full compiler invocation reading the source from stdin.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompileCommand {
    /// Compiler executable.
    pub program: PathBuf,
    /// Compile flags, language flag, `-o <artifact> -`, then link flags.
    pub args: Vec<String>,
}

impl CompileCommand {
    /// Compile flags, language mode, `-o <artifact> -`, then link flags.
    /// A stray `-c` is dropped so the driver always links.
    pub fn build(compiler: &Path, flags: &[String], artifact: &Path) -> Self {
        let (link, compile): (Vec<&String>, Vec<&String>) = flags
            .iter()
            .filter(|flag| flag.as_str() != "-c")
            .partition(|flag| is_link_flag(flag));

        let mut args: Vec<String> = compile.into_iter().cloned().collect();
        args.extend(language_flag(compiler).map(String::from));
        args.push("-o".to_string());
        args.push(artifact.to_string_lossy().into_owned());
        args.push("-".to_string());
        args.extend(link.into_iter().cloned());
        Self {
            program: compiler.to_path_buf(),
            args,
        }
    }
}

impl fmt::Display for CompileCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.program.display())?;
        for arg in &self.args {
            write!(f, " {arg}")?;
        }
        Ok(())
    }
}

/// One compiler run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompilationAttempt {
    /// Exact text fed to the compiler.
    pub source: String,
    /// `None` for whole files compiled as written.
    pub variant: Option<Variant>,
    /// The compiler exited with status 0.
    pub succeeded: bool,
    /// Everything the compiler wrote to stderr.
    pub diagnostics: String,
}

/// Result of [`Toolchain::compile_and_execute`].
#[derive(Debug)]
pub enum Outcome {
    Executed(RunResult),
    Rejected(CompilationAttempt),
}

/// Compile-and-run seam used by the session driver.
pub trait Backend {
    fn compile_and_execute(
        &mut self,
        source: &str,
        variant: Option<Variant>,
        out: &mut dyn Write,
    ) -> Result<Outcome>;
}

/// Split and substitution-expand user flag strings.
pub fn expand_flags<'a, I>(flag_strings: I, env: &Environment) -> Result<Vec<String>>
where
    I: IntoIterator<Item = &'a str>,
{
    let mut flags = Vec::new();
    for text in flag_strings {
        let expanded = subst::expand(text, env)?;
        flags.extend(expanded.split_whitespace().map(String::from));
    }
    Ok(flags)
}

/// The compiler plus everything needed to run what it produces.
pub struct Toolchain {
    compiler: PathBuf,
    flags: Vec<String>,
    artifact: PathBuf,
    runner: ProcessRunner,
    input: Box<dyn LineSource + Send>,
    dump_source: Option<PathBuf>,
}

impl Toolchain {
    /// `flags` are already expanded; compile and link flags may be mixed.
    pub fn new(compiler: impl Into<PathBuf>, flags: Vec<String>, artifact: impl Into<PathBuf>) -> Self {
        Self {
            compiler: compiler.into(),
            flags,
            artifact: artifact.into(),
            runner: ProcessRunner::default(),
            input: Box::new(ClosedInput),
            dump_source: None,
        }
    }

    /// Toolchain built from the configured `CXXFLAGS` and `LDFLAGS`.
    pub fn from_config(
        compiler: impl Into<PathBuf>,
        config: &Config,
        env: &Environment,
        artifact: impl Into<PathBuf>,
    ) -> Result<Self> {
        let flags = expand_flags([config.cxxflags(), config.ldflags()], env)?;
        Ok(Self::new(compiler, flags, artifact))
    }

    /// Arguments passed to every executed program.
    pub fn with_program_args(mut self, runner: ProcessRunner) -> Self {
        self.runner = runner;
        self
    }

    /// Where the program's stdin comes from while it runs.
    pub fn with_input(mut self, input: Box<dyn LineSource + Send>) -> Self {
        self.input = input;
        self
    }

    /// Also write every compiled source to `path`.
    pub fn with_dump_source(mut self, path: Option<PathBuf>) -> Self {
        self.dump_source = path;
        self
    }

    pub fn compiler(&self) -> &Path {
        &self.compiler
    }

    /// Switch compilers, e.g. for a file's `CXX` directive.
    pub fn set_compiler(&mut self, compiler: impl Into<PathBuf>) {
        self.compiler = compiler.into();
    }

    /// Append flags after the configured ones.
    pub fn extend_flags(&mut self, flags: impl IntoIterator<Item = String>) {
        self.flags.extend(flags);
    }

    /// The invocation [`compile`](Self::compile) would run.
    pub fn command(&self) -> CompileCommand {
        CompileCommand::build(&self.compiler, &self.flags, &self.artifact)
    }

    /// Run the compiler on `source`. A compiler that exits non-zero yields a
    /// failed attempt, not an error.
    pub fn compile(&self, source: &str, variant: Option<Variant>) -> Result<CompilationAttempt> {
        if let Some(path) = &self.dump_source {
            if let Err(e) = fs::write(path, source) {
                warn!(path = %path.display(), error = %e, "cannot dump source");
            }
        }

        let command = self.command();
        debug!(%command, ?variant, "compiling");
        let mut child = Command::new(&command.program)
            .args(&command.args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| Error::spawn(command.program.display().to_string(), e))?;

        let stdin = child.stdin.take();
        let output = thread::scope(|s| {
            s.spawn(move || {
                if let Some(mut stdin) = stdin {
                    // The compiler may bail out before reading everything.
                    let _ = stdin.write_all(source.as_bytes());
                }
            });
            child.wait_with_output()
        })?;

        let succeeded = output.status.success();
        info!(?variant, succeeded, status = %output.status, "compiled");
        if !output.stdout.is_empty() {
            debug!(stdout = %String::from_utf8_lossy(&output.stdout), "compiler output");
        }
        Ok(CompilationAttempt {
            source: source.to_string(),
            variant,
            succeeded,
            diagnostics: String::from_utf8_lossy(&output.stderr).into_owned(),
        })
    }
}

impl Backend for Toolchain {
    /// Compile, then run the artifact if compilation succeeded. The artifact
    /// is removed afterwards in every case.
    fn compile_and_execute(
        &mut self,
        source: &str,
        variant: Option<Variant>,
        out: &mut dyn Write,
    ) -> Result<Outcome> {
        let guard = ArtifactGuard::new(&self.artifact);
        let attempt = self.compile(source, variant)?;
        if !attempt.succeeded {
            return Ok(Outcome::Rejected(attempt));
        }
        let result = self.runner.run(guard.path(), self.input.as_mut(), out)?;
        Ok(Outcome::Executed(result))
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;

    const FAKE_COMPILER: &str = r#"
out=""
prev=""
for a in "$@"; do
  if [ "$prev" = "-o" ]; then out="$a"; fi
  prev="$a"
done
src=$(cat)
case "$src" in
  *FAIL*) echo "<stdin>:1:1: error: bad thing" >&2; exit 1;;
esac
printf '#!/bin/sh\necho compiled-ok "$@"\n' > "$out"
chmod +x "$out"
"#;

    struct Fixture {
        dir: tempfile::TempDir,
        toolchain: Toolchain,
    }

    impl Fixture {
        fn artifact(&self) -> PathBuf {
            self.dir.path().join("a.out")
        }
    }

    /// `/bin/sh` posing as a compiler: the script path is the first flag.
    fn fixture() -> Fixture {
        let dir = tempfile::tempdir().unwrap();
        let script = dir.path().join("fakecc.sh");
        fs::write(&script, FAKE_COMPILER).unwrap();
        let toolchain = Toolchain::new(
            "/bin/sh",
            vec![script.to_string_lossy().into_owned()],
            dir.path().join("a.out"),
        );
        Fixture { dir, toolchain }
    }

    fn strings(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_language_flag_from_basename() {
        assert_eq!(language_flag(Path::new("/usr/bin/g++")), Some("-xc++"));
        assert_eq!(language_flag(Path::new("clang++")), Some("-xc++"));
        assert_eq!(language_flag(Path::new("clang++-17")), Some("-xc++"));
        assert_eq!(language_flag(Path::new("x86_64-linux-gnu-g++-13")), Some("-xc++"));
        assert_eq!(language_flag(Path::new("/usr/bin/c++")), Some("-xc++"));
        assert_eq!(language_flag(Path::new("clang")), Some("-xc"));
        assert_eq!(language_flag(Path::new("gcc")), Some("-xc"));
        assert_eq!(language_flag(Path::new("cc")), Some("-xc"));
        assert_eq!(language_flag(Path::new("/bin/sh")), None);
    }

    #[test]
    fn test_command_routes_link_flags_last() {
        let flags = strings(&["-pipe", "-lm", "-c", "-L/opt/lib", "-O2", "-Wl,--as-needed", "-LIBX"]);
        let command = CompileCommand::build(Path::new("g++"), &flags, Path::new("/tmp/x.out"));
        assert_eq!(
            command.args,
            strings(&[
                "-pipe", "-O2", "-xc++", "-o", "/tmp/x.out", "-", "-lm", "-L/opt/lib",
                "-Wl,--as-needed", "-LIBX",
            ])
        );
        assert_eq!(command.to_string(), format!("g++ {}", command.args.join(" ")));
    }

    #[test]
    fn test_compile_success_and_failure() {
        let fx = fixture();
        let ok = fx.toolchain.compile("int main() {}", Some(Variant::Printing)).unwrap();
        assert!(ok.succeeded);
        assert!(ok.diagnostics.is_empty());
        assert!(fx.artifact().exists());

        let bad = fx.toolchain.compile("FAIL", Some(Variant::Safe)).unwrap();
        assert!(!bad.succeeded);
        assert_eq!(bad.variant, Some(Variant::Safe));
        assert_eq!(bad.source, "FAIL");
        assert_eq!(bad.diagnostics, "<stdin>:1:1: error: bad thing\n");
    }

    #[test]
    fn test_compile_and_execute_runs_then_removes_artifact() {
        let mut fx = fixture();
        fx.toolchain = fx
            .toolchain
            .with_program_args(ProcessRunner::new(["one", "two"]));
        let mut out: Vec<u8> = Vec::new();
        let outcome = fx.toolchain.compile_and_execute("x", None, &mut out).unwrap();
        match outcome {
            Outcome::Executed(result) => assert!(result.success()),
            Outcome::Rejected(a) => panic!("rejected: {}", a.diagnostics),
        }
        assert_eq!(String::from_utf8(out).unwrap(), "compiled-ok one two\n");
        assert!(!fx.artifact().exists());
    }

    #[test]
    fn test_rejected_source_is_not_run() {
        let mut fx = fixture();
        let mut out: Vec<u8> = Vec::new();
        let outcome = fx.toolchain.compile_and_execute("FAIL", None, &mut out).unwrap();
        assert!(matches!(outcome, Outcome::Rejected(ref a) if !a.succeeded));
        assert!(out.is_empty());
        assert!(!fx.artifact().exists());
    }

    #[test]
    fn test_dump_source_is_written() {
        let fx = fixture();
        let dump = fx.dir.path().join("dump.cpp");
        let toolchain = Toolchain::new("/bin/sh", fx.toolchain.flags.clone(), fx.artifact())
            .with_dump_source(Some(dump.clone()));
        toolchain.compile("int x;", None).unwrap();
        assert_eq!(fs::read_to_string(dump).unwrap(), "int x;");
    }

    #[test]
    fn test_missing_compiler_is_a_spawn_error() {
        let toolchain = Toolchain::new("/nonexistent/c++", Vec::new(), "/tmp/never.out");
        let err = toolchain.compile("", None).unwrap_err();
        assert!(matches!(err, Error::Spawn { .. }));
    }

    #[test]
    fn test_flags_are_substitution_expanded() {
        let env = Environment::from_vars([("PATH", "/usr/bin:/bin")]);
        let flags = expand_flags(["-O2 `echo -DX=1 -DY`", "$(echo -lm)"], &env).unwrap();
        assert_eq!(flags, strings(&["-O2", "-DX=1", "-DY", "-lm"]));
    }
}
