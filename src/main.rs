use std::io::{self, IsTerminal, Read};
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use anyhow::{Context, Result};
use argh::{EarlyExit, FromArgs};
use tracing::warn;
use tracing_subscriber::EnvFilter;

use cpi::artifact;
use cpi::env::Environment;
use cpi::io_adapters::{ClosedInput, LineSource, TerminalInput};
use cpi::locate::locate_compiler;
use cpi::runner::ProcessRunner;
use cpi::script::{self, ProgramSource};
use cpi::toolchain::expand_flags;
use cpi::{Config, Interpreter, Profile, Session, Toolchain};

const VERSION: &str = env!("CARGO_PKG_VERSION");

#[derive(FromArgs)]
/// Tiny C++ interpreter. Runs in interactive mode by default; `cpi -` reads a
/// program from stdin, and arguments after `--` are passed to the program.
struct Cli {
    #[argh(switch)]
    /// print the version and exit.
    version: bool,

    #[argh(switch)]
    /// add Qt Core headers and printers for Qt types.
    qt: bool,

    #[argh(option)]
    /// also write every compiled source to this path.
    dump_source: Option<PathBuf>,

    #[argh(option)]
    /// configuration file to use instead of the default one.
    config: Option<PathBuf>,

    #[argh(positional)]
    /// path of a C++ file to compile and run.
    file: Option<PathBuf>,
}

/// Command line with the parts `argh` must not see taken out.
#[derive(Debug, Default, PartialEq, Eq)]
struct SplitArgs {
    options: Vec<String>,
    from_stdin: bool,
    program_args: Vec<String>,
}

fn split_cli(args: impl IntoIterator<Item = String>) -> SplitArgs {
    let mut split = SplitArgs::default();
    let mut args = args.into_iter();
    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--" => {
                split.program_args.extend(args.by_ref());
                break;
            }
            "-" => split.from_stdin = true,
            _ => split.options.push(arg),
        }
    }
    split
}

fn init_tracing() {
    let filter = EnvFilter::try_from_env("CPI_LOG").unwrap_or_else(|_| EnvFilter::new("warn"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .try_init();
}

fn load_config(cli: &Cli, env: &Environment) -> Result<Config> {
    let path = match &cli.config {
        Some(path) => path.clone(),
        None => match Config::default_path(env) {
            Some(path) => path,
            None => {
                warn!("neither XDG_CONFIG_HOME nor HOME is set; using built-in settings");
                return Ok(Config::builtin());
            }
        },
    };
    Ok(Config::load_or_create(&path)?)
}

fn banner(config_path: &Path) -> String {
    format!(
        "cpi {VERSION}\nType \".help\" for more information.\nLoaded config file: {}\n",
        config_path.display()
    )
}

fn run() -> Result<i32> {
    let mut raw = std::env::args();
    let name = raw.next().unwrap_or_else(|| "cpi".to_string());
    let split = split_cli(raw);
    let options: Vec<&str> = split.options.iter().map(String::as_str).collect();
    let cli = match Cli::from_args(&[name.as_str()], &options) {
        Ok(cli) => cli,
        Err(EarlyExit { output, status }) => {
            return Ok(match status {
                Ok(()) => {
                    println!("{output}");
                    0
                }
                Err(()) => {
                    eprintln!("{output}");
                    1
                }
            });
        }
    };
    if cli.version {
        println!("cpi {VERSION}");
        return Ok(0);
    }

    let env = Environment::new();
    let config = load_config(&cli, &env)?;
    let artifact = artifact::transient_path();
    if let Err(e) = artifact::install_cleanup_handlers(&artifact) {
        warn!(error = %e, "cannot install signal handlers");
    }
    let program_args = ProcessRunner::new(split.program_args);

    if let Some(file) = &cli.file {
        let program = ProgramSource::read(file)?;
        let compiler = locate_compiler(program.compiler.as_deref().unwrap_or(config.cxx()), &env)?;
        let mut toolchain = Toolchain::from_config(compiler, &config, &env, &artifact)?
            .with_program_args(program_args)
            .with_input(Box::new(TerminalInput::new()))
            .with_dump_source(cli.dump_source.clone());
        if let Some(options) = &program.compile_options {
            toolchain.extend_flags(expand_flags([options.as_str()], &env)?);
        }
        return Ok(script::run_program(&mut toolchain, &program.text, &mut io::stdout())?);
    }

    if split.from_stdin {
        let mut text = String::new();
        io::stdin()
            .read_to_string(&mut text)
            .context("cannot read the program from stdin")?;
        let program = ProgramSource::from_stdin_text(text);
        let compiler = locate_compiler(config.cxx(), &env)?;
        let mut toolchain = Toolchain::from_config(compiler, &config, &env, &artifact)?
            .with_program_args(program_args)
            .with_dump_source(cli.dump_source.clone());
        return Ok(script::run_program(&mut toolchain, &program.text, &mut io::stdout())?);
    }

    let compiler = locate_compiler(config.cxx(), &env)?;
    // Forwarding from a pipe would eat the lines meant for the prompt.
    let input: Box<dyn LineSource + Send> = if io::stdin().is_terminal() {
        Box::new(TerminalInput::new())
    } else {
        Box::new(ClosedInput)
    };
    let toolchain = Toolchain::from_config(compiler, &config, &env, &artifact)?
        .with_program_args(program_args)
        .with_input(input)
        .with_dump_source(cli.dump_source.clone());

    print!("{}", banner(config.path()));

    let profile = if cli.qt { Profile::Qt } else { Profile::Standard };
    let mut cpi = Interpreter::new(Session::new(config, profile), toolchain);
    cpi.repl()?;
    Ok(0)
}

fn main() -> ExitCode {
    init_tracing();
    match run() {
        Ok(code) => ExitCode::from(u8::try_from(code).unwrap_or(u8::MAX)),
        Err(e) => {
            eprintln!("{e:#}");
            ExitCode::FAILURE
        }
    }
}
