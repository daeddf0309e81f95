use std::ffi::OsString;
use std::io::{self, Read, Write};
use std::path::Path;
use std::process::{Child, ChildStdin, Command, ExitStatus, Stdio};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError};
use std::thread;
use std::time::Duration;

use tracing::{debug, warn};

use crate::error::{Error, Result};
use crate::io_adapters::{InputEvent, LineSource};

/// How long any of the runner's loops waits before re-checking state.
pub const POLL_INTERVAL: Duration = Duration::from_millis(50);

/// Outcome of one program run. Its output has already been written out.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RunResult {
    /// Raw wait status of the program.
    pub status: ExitStatus,
}

impl RunResult {
    /// Shell-style exit code: the program's own code, or 128 + signal.
    pub fn exit_code(&self) -> i32 {
        match self.status.code() {
            Some(x) => x,
            None => terminated_by_signal(self.status),
        }
    }

    /// Normal exit with code 0.
    pub fn success(&self) -> bool {
        self.status.success()
    }
}

#[cfg(unix)]
fn terminated_by_signal(exit_status: ExitStatus) -> i32 {
    use std::os::unix::process::ExitStatusExt;
    if let Some(signal) = ExitStatusExt::signal(&exit_status) {
        128 + signal
    } else if ExitStatusExt::core_dumped(&exit_status) {
        255
    } else {
        -1
    }
}

#[cfg(not(unix))]
fn terminated_by_signal(_exit_status: ExitStatus) -> i32 {
    -1
}

/// Runs a compiled program with its stdout and stderr merged into one stream.
///
/// While the program runs, lines from a [`LineSource`] are forwarded to its
/// stdin and its output is relayed in the order it was produced.
#[derive(Debug, Clone, Default)]
pub struct ProcessRunner {
    args: Vec<OsString>,
}

impl ProcessRunner {
    /// Runner that passes `args` to every program it starts.
    pub fn new<I, S>(args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<OsString>,
    {
        Self {
            args: args.into_iter().map(Into::into).collect(),
        }
    }

    /// Start `exe`, relay its merged output to `out` and forward lines from
    /// `input` until it exits.
    ///
    /// Returns once the program has exited and its output is drained or the
    /// pipe went quiet. Input left over afterwards is discarded.
    pub fn run(
        &self,
        exe: &Path,
        input: &mut (dyn LineSource + Send),
        out: &mut dyn Write,
    ) -> Result<RunResult> {
        let (reader, writer) = io::pipe()?;
        let mut child = {
            let mut command = Command::new(exe);
            command
                .args(&self.args)
                .stdin(Stdio::piped())
                .stdout(writer.try_clone()?)
                .stderr(writer);
            command
                .spawn()
                .map_err(|e| Error::spawn(exe.display().to_string(), e))?
        };
        // `command` is gone, so the child now holds the only write ends.
        debug!(exe = %exe.display(), pid = child.id(), "program started");

        let (tx, rx) = mpsc::channel();
        // Not joined: a background grandchild may keep the pipe open.
        thread::spawn(move || pump(reader, tx));

        let stdin = child.stdin.take();
        let done = AtomicBool::new(false);
        let relayed = thread::scope(|s| {
            let feeder = s.spawn(|| feed(input, stdin, &done));
            let relayed = relay(&mut child, &rx, out);
            done.store(true, Ordering::Release);
            if feeder.join().is_err() {
                warn!("input forwarding thread panicked");
            }
            relayed
        });
        input.discard_pending();

        let status = match relayed {
            Ok(status) => status,
            Err(e) => {
                let _ = child.kill();
                let _ = child.wait();
                return Err(e.into());
            }
        };
        debug!(%status, "program finished");
        Ok(RunResult { status })
    }
}

fn pump(mut reader: io::PipeReader, tx: mpsc::Sender<Vec<u8>>) {
    let mut buf = [0u8; 4096];
    loop {
        match reader.read(&mut buf) {
            Ok(0) => break,
            Ok(n) => {
                if tx.send(buf[..n].to_vec()).is_err() {
                    break;
                }
            }
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(_) => break,
        }
    }
}

fn feed(input: &mut (dyn LineSource + Send), mut stdin: Option<ChildStdin>, done: &AtomicBool) {
    while !done.load(Ordering::Acquire) {
        match input.poll_line(POLL_INTERVAL) {
            Ok(InputEvent::Line(line)) => {
                if let Some(pipe) = stdin.as_mut() {
                    if writeln!(pipe, "{line}").and_then(|()| pipe.flush()).is_err() {
                        // The program closed its stdin; keep the rest for the prompt.
                        stdin = None;
                        break;
                    }
                }
            }
            Ok(InputEvent::Idle) => {}
            Ok(InputEvent::Closed) => break,
            Err(e) => {
                warn!(error = %e, "cannot read input for the program");
                break;
            }
        }
    }
    drop(stdin);
}

fn relay(child: &mut Child, rx: &Receiver<Vec<u8>>, out: &mut dyn Write) -> io::Result<ExitStatus> {
    let mut status = None;
    loop {
        match rx.recv_timeout(POLL_INTERVAL) {
            Ok(chunk) => {
                out.write_all(&chunk)?;
                out.flush()?;
            }
            Err(RecvTimeoutError::Timeout) => {
                if status.is_some() {
                    break;
                }
                status = child.try_wait()?;
            }
            Err(RecvTimeoutError::Disconnected) => break,
        }
    }
    match status {
        Some(status) => Ok(status),
        None => child.wait(),
    }
}
