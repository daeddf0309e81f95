use std::io::{self, Write};

use anyhow::Result;
use rustyline::DefaultEditor;
use rustyline::error::ReadlineError;
use tracing::debug;

use crate::builtin;
use crate::command::{CommandFactory, split_command};
use crate::diagnostic;
use crate::runner::RunResult;
use crate::session::Session;
use crate::synth::Variant;
use crate::toolchain::{Backend, Outcome};

pub const PROMPT: &str = "cpi> ";

/// What happened to one submitted line.
#[derive(Debug)]
pub enum Turn {
    /// A session command ran, or there was nothing to compile.
    Handled,
    /// One of the variants compiled and the program ran.
    Ran(RunResult),
    /// Both variants were rejected.
    Rejected { rolled_back: bool },
}

/// Interactive driver: every line is either a session command or more code,
/// and every code line triggers a full compile-and-run of the buffer.
///
/// Example
/// ```no_run
/// use cpi::{Interpreter, Session, Toolchain};
/// let toolchain = Toolchain::new("/usr/bin/g++", vec!["-std=c++2a".into()], "/tmp/a.out");
/// let mut cpi = Interpreter::new(Session::default(), toolchain);
/// cpi.submit("int x = 5;", &mut std::io::stdout()).unwrap();
/// cpi.submit("x + 2", &mut std::io::stdout()).unwrap(); // prints 7
/// ```
pub struct Interpreter<B> {
    session: Session,
    backend: B,
    commands: Vec<Box<dyn CommandFactory>>,
}

impl<B: Backend> Interpreter<B> {
    pub fn new(session: Session, backend: B) -> Self {
        Self {
            session,
            backend,
            commands: builtin::factories(),
        }
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    pub fn should_exit(&self) -> bool {
        self.session.should_exit
    }

    /// Process one line of user input.
    pub fn submit(&mut self, line: &str, out: &mut dyn Write) -> Result<Turn> {
        if let Some((name, args)) = split_command(line) {
            let command = self
                .commands
                .iter()
                .find_map(|factory| factory.try_create(name, &args));
            if let Some(command) = command {
                command.execute(out, &mut self.session)?;
                return Ok(Turn::Handled);
            }
        }

        if line.trim().is_empty() {
            return Ok(Turn::Handled);
        }
        self.session.buffer.append_line(line);
        if !self.session.buffer.has_statements() {
            return Ok(Turn::Handled);
        }

        match self.compile_turn(out) {
            Ok(turn) => Ok(turn),
            Err(e) => {
                self.session.buffer.rollback_last();
                Err(e)
            }
        }
    }

    fn compile_turn(&mut self, out: &mut dyn Write) -> Result<Turn> {
        for variant in [Variant::Printing, Variant::Safe] {
            let source = self.session.synthesize(variant);
            match self.backend.compile_and_execute(&source, Some(variant), out)? {
                Outcome::Executed(result) => {
                    debug!(?variant, code = result.exit_code(), "turn executed");
                    if variant == Variant::Printing {
                        self.session.buffer.close_last_statement();
                    }
                    return Ok(Turn::Ran(result));
                }
                Outcome::Rejected(attempt) if variant == Variant::Safe => {
                    let statements = self.session.buffer.render().statements;
                    if let Some(message) = diagnostic::extract(&attempt.diagnostics, &statements) {
                        writeln!(out, "{message}")?;
                    }
                    let rolled_back = !diagnostic::defines_entry_point(&statements)
                        && self.session.buffer.rollback_last();
                    return Ok(Turn::Rejected { rolled_back });
                }
                Outcome::Rejected(_) => {}
            }
        }
        Ok(Turn::Rejected { rolled_back: false })
    }

    /// Read-eval-print loop on the terminal until `.quit` or end of input.
    pub fn repl(&mut self) -> rustyline::Result<()> {
        let mut rl = DefaultEditor::new()?;
        let mut stdout = io::stdout();

        while !self.should_exit() {
            match rl.readline(PROMPT) {
                Ok(line) => {
                    if !line.trim().is_empty() {
                        rl.add_history_entry(line.as_str())?;
                    }
                    if let Err(e) = self.submit(&line, &mut stdout) {
                        eprintln!("cpi: {e:#}");
                    }
                }
                Err(ReadlineError::Interrupted) | Err(ReadlineError::Eof) => break,
                Err(err) => return Err(err),
            }
        }
        Ok(())
    }
}
