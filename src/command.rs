use std::io::Write;

use anyhow::Result;

use crate::session::Session;

/// Object-safe trait for any session command the interpreter can run.
///
/// Implemented by every [`crate::builtin`] command through a blanket impl.
pub trait ExecutableCommand {
    fn execute(self: Box<Self>, out: &mut dyn Write, session: &mut Session) -> Result<()>;
}

/// Factory that tries to create a command from a name and its arguments.
///
/// Returns `None` when the factory doesn't recognize the `name`, in which
/// case the line is treated as code.
pub trait CommandFactory {
    fn try_create(&self, name: &str, args: &[&str]) -> Option<Box<dyn ExecutableCommand>>;
}

/// Creates commands of type `T`.
pub(crate) struct Factory<T> {
    _phantom: std::marker::PhantomData<T>,
}

impl<T> Default for Factory<T> {
    fn default() -> Self {
        Self {
            _phantom: std::marker::PhantomData,
        }
    }
}

/// Split a raw input line into a command name and its arguments.
pub fn split_command(line: &str) -> Option<(&str, Vec<&str>)> {
    let mut words = line.split_whitespace();
    let name = words.next()?;
    Some((name, words.collect()))
}
