use std::io::Write;

use anyhow::Result;
use argh::{EarlyExit, FromArgs};

use crate::command::{CommandFactory, ExecutableCommand, Factory};
use crate::session::Session;

/// Dot-commands understood by the interactive session.
///
/// Commands are parsed using the [`argh`] crate (`FromArgs`) and act on the
/// [`Session`] directly; none of them touches the compile pipeline.
pub(crate) trait BuiltinCommand: Sized + FromArgs {
    /// Every name the command answers to. The first one is canonical.
    fn names() -> &'static [&'static str];

    fn execute(self, out: &mut dyn Write, session: &mut Session) -> Result<()>;
}

impl<T: BuiltinCommand> ExecutableCommand for T {
    fn execute(self: Box<Self>, out: &mut dyn Write, session: &mut Session) -> Result<()> {
        T::execute(*self, out, session)
    }
}

struct InvalidArgs {
    output: String,
}

impl ExecutableCommand for InvalidArgs {
    fn execute(self: Box<Self>, out: &mut dyn Write, _session: &mut Session) -> Result<()> {
        writeln!(out, "{}", self.output.trim_end())?;
        Ok(())
    }
}

impl<T: BuiltinCommand + 'static> CommandFactory for Factory<T> {
    fn try_create(&self, name: &str, args: &[&str]) -> Option<Box<dyn ExecutableCommand>> {
        if !T::names().contains(&name) {
            return None;
        }
        Some(match T::from_args(&[name], args) {
            Ok(cmd) => Box::new(cmd),
            Err(EarlyExit { output, .. }) => Box::new(InvalidArgs { output }),
        })
    }
}

/// Factories for every session command.
pub(crate) fn factories() -> Vec<Box<dyn CommandFactory>> {
    vec![
        Box::new(Factory::<Help>::default()),
        Box::new(Factory::<Show>::default()),
        Box::new(Factory::<Conf>::default()),
        Box::new(Factory::<Rm>::default()),
        Box::new(Factory::<Clear>::default()),
        Box::new(Factory::<Quit>::default()),
    ]
}

pub const HELP_TEXT: &str = "\
 .conf          Display the current values for various settings.
 .help, ?       Display this help.
 .rm LINENO...  Remove the code on the given line numbers (also .del).
 .clear         Clear all code.
 .show          Show the current source code (also .code).
 .quit, .q      Exit this program.
";

#[derive(FromArgs)]
/// Display the list of session commands.
pub struct Help {}

impl BuiltinCommand for Help {
    fn names() -> &'static [&'static str] {
        &[".help", "?"]
    }

    fn execute(self, out: &mut dyn Write, _session: &mut Session) -> Result<()> {
        out.write_all(HELP_TEXT.as_bytes())?;
        Ok(())
    }
}

#[derive(FromArgs)]
/// Show the current source code with line numbers.
pub struct Show {}

impl BuiltinCommand for Show {
    fn names() -> &'static [&'static str] {
        &[".show", ".code"]
    }

    fn execute(self, out: &mut dyn Write, session: &mut Session) -> Result<()> {
        write!(out, "{}", session.buffer)?;
        Ok(())
    }
}

#[derive(FromArgs)]
/// Display the current values for various settings.
pub struct Conf {}

impl BuiltinCommand for Conf {
    fn names() -> &'static [&'static str] {
        &[".conf"]
    }

    fn execute(self, out: &mut dyn Write, session: &mut Session) -> Result<()> {
        for (key, value) in session.config.entries() {
            writeln!(out, "{key}={value}")?;
        }
        Ok(())
    }
}

#[derive(FromArgs)]
/// Remove the code on the given line numbers, then show what is left.
pub struct Rm {
    #[argh(positional, greedy)]
    /// line numbers as shown by .show, separated by commas or spaces.
    pub lines: Vec<String>,
}

impl Rm {
    /// Positive numbers in the arguments; anything else is skipped.
    fn numbers(&self) -> Vec<usize> {
        self.lines
            .iter()
            .flat_map(|arg| arg.split(|c: char| c == ',' || c.is_whitespace()))
            .filter_map(|word| word.parse::<usize>().ok())
            .filter(|&n| n > 0)
            .collect()
    }
}

impl BuiltinCommand for Rm {
    fn names() -> &'static [&'static str] {
        &[".rm", ".del"]
    }

    fn execute(self, out: &mut dyn Write, session: &mut Session) -> Result<()> {
        session.buffer.delete_many(self.numbers());
        write!(out, "{}", session.buffer)?;
        Ok(())
    }
}

#[derive(FromArgs)]
/// Clear all code, headers included.
pub struct Clear {}

impl BuiltinCommand for Clear {
    fn names() -> &'static [&'static str] {
        &[".clear"]
    }

    fn execute(self, _out: &mut dyn Write, session: &mut Session) -> Result<()> {
        session.buffer.clear();
        Ok(())
    }
}

#[derive(FromArgs)]
/// Exit the interpreter.
pub struct Quit {}

impl BuiltinCommand for Quit {
    fn names() -> &'static [&'static str] {
        &[".quit", ".q"]
    }

    fn execute(self, _out: &mut dyn Write, session: &mut Session) -> Result<()> {
        session.should_exit = true;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::command::split_command;

    fn run(session: &mut Session, line: &str) -> Option<String> {
        let (name, args) = split_command(line)?;
        let cmd = factories()
            .iter()
            .find_map(|f| f.try_create(name, &args))?;
        let mut out: Vec<u8> = Vec::new();
        cmd.execute(&mut out, session).unwrap();
        Some(String::from_utf8(out).unwrap())
    }

    fn session_with(lines: &[&str]) -> Session {
        let mut session = Session::default();
        for line in lines {
            session.buffer.append_line(line);
        }
        session
    }

    #[test]
    fn test_code_is_not_a_command() {
        let mut session = Session::default();
        assert_eq!(run(&mut session, "int x = 1;"), None);
        assert_eq!(run(&mut session, ".unknown"), None);
        assert_eq!(run(&mut session, "?x"), None);
    }

    #[test]
    fn test_help_and_alias() {
        let mut session = Session::default();
        assert_eq!(run(&mut session, ".help").as_deref(), Some(HELP_TEXT));
        assert_eq!(run(&mut session, "?").as_deref(), Some(HELP_TEXT));
    }

    #[test]
    fn test_rm_renumbers_and_shows_listing() {
        let mut session = session_with(&["int a = 1;", "int b = 2;", "int c = 3;"]);
        let out = run(&mut session, ".rm 2").unwrap();
        assert_eq!(out, "  1| int a = 1;\n  2| int c = 3;\n");
        assert_eq!(session.buffer.render().statements, "int a = 1;\nint c = 3;");
    }

    #[test]
    fn test_del_accepts_mixed_separators() {
        let mut session = session_with(&["#include <map>", "int a;", "int b;", "int c;"]);
        run(&mut session, ".del 4, 2,x 0").unwrap();
        assert_eq!(session.buffer.render().statements, "int b;");
        assert_eq!(session.buffer.header_count(), 1);
    }

    #[test]
    fn test_show_and_code_alias() {
        let mut session = session_with(&["#include <string>", "std::string s;"]);
        let expected = "  1| #include <string>\n    --------------------\n  2| std::string s;\n";
        assert_eq!(run(&mut session, ".show").as_deref(), Some(expected));
        assert_eq!(run(&mut session, "  .code  ").as_deref(), Some(expected));
    }

    #[test]
    fn test_conf_lists_keys() {
        let mut session = Session::default();
        let out = run(&mut session, ".conf").unwrap();
        assert_eq!(
            out,
            "CXX=\nCXXFLAGS=-pipe -std=c++2a -D_REENTRANT\nLDFLAGS=\nCOMMON_INCLUDES=\n"
        );
    }

    #[test]
    fn test_clear_and_quit() {
        let mut session = session_with(&["#include <map>", "int a;"]);
        run(&mut session, ".clear").unwrap();
        assert!(session.buffer.is_empty());
        assert!(!session.should_exit);
        run(&mut session, ".q").unwrap();
        assert!(session.should_exit);
    }

    #[test]
    fn test_invalid_args_print_usage() {
        let mut session = session_with(&["int a;"]);
        let out = run(&mut session, ".show extra").unwrap();
        assert!(out.contains("Unrecognized argument"), "{out}");
        let out = run(&mut session, ".rm --help").unwrap();
        assert!(out.contains("Usage: .rm"), "{out}");
        assert_eq!(session.buffer.len(), 1);
    }
}
