use std::collections::VecDeque;
use std::io::Result as IoResult;
use std::time::Duration;

/// What a [`LineSource`] produced within one poll.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InputEvent {
    /// A complete line, without its terminator.
    Line(String),
    /// Nothing arrived before the timeout.
    Idle,
    /// End of input; no further lines will follow.
    Closed,
}

/// Interactive input forwarded to a running program.
///
/// Polling is bounded so the caller can notice that the program has exited
/// without consuming input meant for the next prompt.
pub trait LineSource {
    fn poll_line(&mut self, timeout: Duration) -> IoResult<InputEvent>;

    /// Drop input that was read for a program which has since exited, so it
    /// does not reach the next one.
    fn discard_pending(&mut self) {}
}

/// Process standard input, read without blocking longer than the timeout.
#[derive(Debug, Default)]
pub struct TerminalInput {
    pending: Vec<u8>,
    eof: bool,
}

impl TerminalInput {
    pub fn new() -> Self {
        Self::default()
    }

    fn take_line(&mut self) -> Option<String> {
        let end = self.pending.iter().position(|&b| b == b'\n')?;
        let mut line: Vec<u8> = self.pending.drain(..=end).collect();
        line.pop();
        if line.last() == Some(&b'\r') {
            line.pop();
        }
        Some(String::from_utf8_lossy(&line).into_owned())
    }

    fn finish(&mut self) -> InputEvent {
        if self.pending.is_empty() {
            InputEvent::Closed
        } else {
            let rest = std::mem::take(&mut self.pending);
            InputEvent::Line(String::from_utf8_lossy(&rest).into_owned())
        }
    }
}

#[cfg(unix)]
impl LineSource for TerminalInput {
    fn discard_pending(&mut self) {
        self.pending.clear();
    }

    fn poll_line(&mut self, timeout: Duration) -> IoResult<InputEvent> {
        if let Some(line) = self.take_line() {
            return Ok(InputEvent::Line(line));
        }
        if self.eof {
            return Ok(self.finish());
        }

        let mut fds = libc::pollfd {
            fd: libc::STDIN_FILENO,
            events: libc::POLLIN,
            revents: 0,
        };
        let millis = timeout.as_millis().min(libc::c_int::MAX as u128) as libc::c_int;
        // SAFETY: `fds` is a valid, initialised pollfd and we pass a count of 1.
        let ready = unsafe { libc::poll(&mut fds, 1, millis) };
        if ready < 0 {
            let err = std::io::Error::last_os_error();
            return if err.kind() == std::io::ErrorKind::Interrupted {
                Ok(InputEvent::Idle)
            } else {
                Err(err)
            };
        }
        if ready == 0 {
            return Ok(InputEvent::Idle);
        }

        let mut chunk = [0u8; 4096];
        // SAFETY: `chunk` is writable for `chunk.len()` bytes.
        let n = unsafe { libc::read(libc::STDIN_FILENO, chunk.as_mut_ptr().cast(), chunk.len()) };
        if n < 0 {
            return Err(std::io::Error::last_os_error());
        }
        if n == 0 {
            self.eof = true;
            return Ok(self.finish());
        }
        self.pending.extend_from_slice(&chunk[..n as usize]);
        Ok(match self.take_line() {
            Some(line) => InputEvent::Line(line),
            None => InputEvent::Idle,
        })
    }
}

#[cfg(not(unix))]
impl LineSource for TerminalInput {
    fn poll_line(&mut self, _timeout: Duration) -> IoResult<InputEvent> {
        Ok(InputEvent::Closed)
    }
}

/// Fixed lines followed by end of input. Used by tests and by non-interactive
/// callers that already know the program's input.
#[derive(Debug, Default, Clone)]
pub struct ScriptedInput {
    lines: VecDeque<String>,
}

impl ScriptedInput {
    pub fn new<I, S>(lines: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            lines: lines.into_iter().map(Into::into).collect(),
        }
    }
}

impl LineSource for ScriptedInput {
    fn poll_line(&mut self, _timeout: Duration) -> IoResult<InputEvent> {
        Ok(match self.lines.pop_front() {
            Some(line) => InputEvent::Line(line),
            None => InputEvent::Closed,
        })
    }
}

/// Input that is already exhausted: the program sees end of file at once.
#[derive(Debug, Default, Clone, Copy)]
pub struct ClosedInput;

impl LineSource for ClosedInput {
    fn poll_line(&mut self, _timeout: Duration) -> IoResult<InputEvent> {
        Ok(InputEvent::Closed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const TICK: Duration = Duration::from_millis(1);

    #[test]
    fn test_scripted_input_ends_with_closed() {
        let mut input = ScriptedInput::new(["a", "b"]);
        assert_eq!(input.poll_line(TICK).unwrap(), InputEvent::Line("a".into()));
        assert_eq!(input.poll_line(TICK).unwrap(), InputEvent::Line("b".into()));
        assert_eq!(input.poll_line(TICK).unwrap(), InputEvent::Closed);
        assert_eq!(input.poll_line(TICK).unwrap(), InputEvent::Closed);
    }

    #[test]
    fn test_closed_input() {
        assert_eq!(ClosedInput.poll_line(TICK).unwrap(), InputEvent::Closed);
    }

    #[test]
    fn test_terminal_buffer_splits_lines() {
        let mut input = TerminalInput::new();
        input.pending.extend_from_slice(b"one\r\ntwo\nthr");
        assert_eq!(input.take_line().as_deref(), Some("one"));
        assert_eq!(input.take_line().as_deref(), Some("two"));
        assert_eq!(input.take_line(), None);
        assert_eq!(input.finish(), InputEvent::Line("thr".into()));
        assert_eq!(input.finish(), InputEvent::Closed);
    }

    #[test]
    #[cfg(unix)]
    fn test_terminal_discards_type_ahead() {
        let mut input = TerminalInput::new();
        input.pending.extend_from_slice(b"late\npartial");
        input.discard_pending();
        assert_eq!(input.take_line(), None);
        assert!(input.pending.is_empty());
    }
}
