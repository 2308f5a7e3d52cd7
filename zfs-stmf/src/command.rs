//! Subprocess execution and result interpretation.
//!
//! Every tool invocation in the crate goes through a [`CommandRunner`] and is
//! judged by [`classify`]. The runner sits behind a trait so tests can script
//! tool output without a real pool or COMSTAR stack.

use std::fmt;
use std::io;
use std::process::{Command, Output, Stdio};
use std::thread;

use tracing::debug;

/// Captured result of one finished child process.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommandOutput {
    /// Exit code, `None` when the child was terminated by a signal
    pub status: Option<i32>,
    pub stdout: String,
    pub stderr: String,
}

impl CommandOutput {
    pub fn success(&self) -> bool {
        self.status == Some(0)
    }

    /// Stdout followed by stderr, the merged view most checks work on.
    pub fn combined(&self) -> String {
        let mut text = String::with_capacity(self.stdout.len() + self.stderr.len());
        text.push_str(&self.stdout);
        text.push_str(&self.stderr);
        text
    }

    pub fn is_silent(&self) -> bool {
        self.stdout.is_empty() && self.stderr.is_empty()
    }
}

impl From<Output> for CommandOutput {
    fn from(output: Output) -> Self {
        Self {
            status: output.status.code(),
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        }
    }
}

/// Executes argument vectors. The first element is the program.
pub trait CommandRunner: fmt::Debug + Send + Sync {
    /// Run a command to completion and capture both streams.
    fn run(&self, argv: &[String]) -> io::Result<CommandOutput>;

    /// Run `producer | consumer` and capture the outcome of both ends.
    fn pipe(
        &self,
        producer: &[String],
        consumer: &[String],
    ) -> io::Result<(CommandOutput, CommandOutput)>;
}

/// Runs commands on the local host via `std::process`.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemRunner;

fn split_program(argv: &[String]) -> io::Result<(&String, &[String])> {
    argv.split_first()
        .ok_or_else(|| io::Error::new(io::ErrorKind::InvalidInput, "empty command line"))
}

impl CommandRunner for SystemRunner {
    fn run(&self, argv: &[String]) -> io::Result<CommandOutput> {
        let (program, args) = split_program(argv)?;
        debug!(command = %display_argv(argv), "Running command");

        let output = Command::new(program)
            .args(args)
            .stdin(Stdio::null())
            .output()?;

        Ok(output.into())
    }

    fn pipe(
        &self,
        producer: &[String],
        consumer: &[String],
    ) -> io::Result<(CommandOutput, CommandOutput)> {
        let (send_program, send_args) = split_program(producer)?;
        let (recv_program, recv_args) = split_program(consumer)?;
        debug!(
            producer = %display_argv(producer),
            consumer = %display_argv(consumer),
            "Running pipeline"
        );

        let mut sender = Command::new(send_program)
            .args(send_args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()?;

        let stream = sender
            .stdout
            .take()
            .ok_or_else(|| io::Error::other("producer stdout was not captured"))?;

        let receiver = match Command::new(recv_program)
            .args(recv_args)
            .stdin(Stdio::from(stream))
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
        {
            Ok(child) => child,
            Err(e) => {
                let _ = sender.kill();
                let _ = sender.wait();
                return Err(e);
            }
        };

        // Both children write to pipes we own; drain the receiver on its own
        // thread so neither side can stall on a full buffer.
        let receiving = thread::spawn(move || receiver.wait_with_output());
        let sent = sender.wait_with_output()?;
        let received = receiving
            .join()
            .map_err(|_| io::Error::other("receiver thread panicked"))??;

        Ok((sent.into(), received.into()))
    }
}

/// What a successful invocation must look like, beyond exit status zero.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Expect {
    /// Nothing printed on either stream
    Silent,
    /// Nothing printed on stderr
    QuietStderr,
    /// Merged output is exactly this line followed by a newline
    ExactLine(String),
    /// Exit status alone decides
    Status,
}

impl Expect {
    pub fn is_met_by(&self, output: &CommandOutput) -> bool {
        if !output.success() {
            return false;
        }

        match self {
            Expect::Silent => output.is_silent(),
            Expect::QuietStderr => output.stderr.is_empty(),
            Expect::ExactLine(line) => {
                output.combined().strip_suffix('\n') == Some(line.as_str())
            }
            Expect::Status => true,
        }
    }
}

/// Outcome of a command once judged against an [`Expect`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Verdict {
    Success(CommandOutput),
    AlreadyExists(CommandOutput),
    NotFound(CommandOutput),
    Failure(CommandOutput),
}

impl Verdict {
    pub fn is_success(&self) -> bool {
        matches!(self, Verdict::Success(_))
    }

    pub fn output(&self) -> &CommandOutput {
        match self {
            Verdict::Success(o)
            | Verdict::AlreadyExists(o)
            | Verdict::NotFound(o)
            | Verdict::Failure(o) => o,
        }
    }

    pub fn into_output(self) -> CommandOutput {
        match self {
            Verdict::Success(o)
            | Verdict::AlreadyExists(o)
            | Verdict::NotFound(o)
            | Verdict::Failure(o) => o,
        }
    }
}

/// Judge a finished command.
///
/// Output that meets `expect` is a success. Anything else is sorted by the
/// wording the storage tools use for the two conditions callers commonly
/// treat specially, and falls back to a plain failure.
pub fn classify(output: CommandOutput, expect: &Expect) -> Verdict {
    if expect.is_met_by(&output) {
        return Verdict::Success(output);
    }

    let text = output.combined();
    if text.contains("already exists") {
        Verdict::AlreadyExists(output)
    } else if text.contains("does not exist") || text.contains("not found") {
        Verdict::NotFound(output)
    } else {
        Verdict::Failure(output)
    }
}

/// Run `argv` through `runner` and classify the result.
pub fn execute(runner: &dyn CommandRunner, argv: &[String], expect: &Expect) -> io::Result<Verdict> {
    let output = runner.run(argv)?;
    let verdict = classify(output, expect);

    if !verdict.is_success() {
        debug!(
            command = %display_argv(argv),
            status = ?verdict.output().status,
            "Command did not produce the expected result"
        );
    }

    Ok(verdict)
}

/// Render an argument vector for logs and error messages.
pub fn display_argv(argv: &[String]) -> String {
    argv.join(" ")
}

/// `(command, output)` for a failed invocation. The output is the tool's
/// own text, or the exit status when it printed nothing.
pub(crate) fn describe_failure(argv: &[String], output: &CommandOutput) -> (String, String) {
    let text = output.combined();
    let detail = match output.status {
        Some(code) if text.trim().is_empty() => format!("exit status {}", code),
        None if text.trim().is_empty() => "terminated by signal".to_string(),
        _ => text.trim_end().to_string(),
    };
    (display_argv(argv), detail)
}

/// Prefix `args` with a tool's argv prefix.
pub fn command_line<I, S>(prefix: &[String], args: I) -> Vec<String>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    prefix
        .iter()
        .cloned()
        .chain(args.into_iter().map(|a| a.as_ref().to_string()))
        .collect()
}
