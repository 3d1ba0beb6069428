//! Utility functions.
use std::{
    ffi::OsString,
    future::Future,
    path::Path,
    pin::Pin,
    process::{exit, ExitStatus},
    task::{Context, Poll},
};

use ansi_term::Color::Red;
use anyhow::{bail, Result};
use futures::{prelude::*, stream, StreamExt};
use pin_project::pin_project;
use thiserror::Error;
use tokio::process::{Child, Command};

use crate::color::Color;

/// Runs the application code inside closure `f`, prints an error using `color`
/// preference if there is any, and sets the exit code.
///
/// A failed child process passes its own exit code through.
pub async fn run_wrapper(color: Color, f: impl Future<Output = Result<()>>) {
    match f.await {
        Ok(()) => {
            exit(0);
        }
        Err(err) if err.is::<SignalError>() => {
            exit(1);
        }
        Err(err) => {
            eprintln!("{}: {:?}", color.bold_fg("Error", Red), err);
            exit(err.downcast_ref::<ExitStatusError>().map_or(1, ExitStatusError::code));
        }
    }
}

/// Spawns the command and checks for errors.
pub fn spawn_command(mut command: Command) -> Result<Child> {
    log::info!("Running {:?}", command);
    match command.spawn() {
        Ok(child) => Ok(child),
        Err(err) => bail!("`{:?}` failed to execute: {}", command, err),
    }
}

/// Formats a command line for display, quoting arguments with spaces.
pub fn command_line(program: &Path, args: &[OsString]) -> String {
    std::iter::once(program.as_os_str())
        .chain(args.iter().map(OsString::as_os_str))
        .map(|arg| {
            let arg = arg.to_string_lossy();
            if arg.is_empty() || arg.contains(char::is_whitespace) {
                format!("\"{}\"", arg)
            } else {
                arg.into_owned()
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

/// A child process finished unsuccessfully.
#[derive(Error, Debug)]
pub enum ExitStatusError {
    /// Exited with a non-zero code.
    #[error("`{0}` exited with status code: {1}")]
    Code(String, i32),
    /// Killed by a signal.
    #[error("`{0}` terminated by signal")]
    Signal(String),
}

impl ExitStatusError {
    /// Converts an unsuccessful `status` of `program` into an error.
    pub fn check(program: &Path, status: ExitStatus) -> Result<(), Self> {
        if status.success() {
            return Ok(());
        }
        let program = program.display().to_string();
        Err(match status.code() {
            Some(code) => Self::Code(program, code),
            None => Self::Signal(program),
        })
    }

    /// Exit code to report for this failure.
    pub fn code(&self) -> i32 {
        match self {
            Self::Code(_, code) => *code,
            Self::Signal(_) => 1,
        }
    }
}

/// Possible encountered signals
#[derive(Eq, PartialEq, Copy, Clone, Debug)]
pub enum Signals {
    /// Interrupt (Ctrl-C).
    SigInt,
    /// Quit.
    #[cfg(unix)]
    SigQuit,
    /// Terminate.
    #[cfg(unix)]
    SigTerm,
    /// Ctrl-Break.
    #[cfg(windows)]
    SigBreak,
}

/// Stream of received signals.
pub type SignalStream = Pin<Box<dyn Stream<Item = Signals> + Send>>;

/// Register desired signals.
#[cfg(unix)]
pub fn register_signals() -> Result<SignalStream> {
    use tokio::signal::unix::{signal, SignalKind};
    let mut interrupt = signal(SignalKind::interrupt())?;
    let mut quit = signal(SignalKind::quit())?;
    let mut terminate = signal(SignalKind::terminate())?;

    Ok(Box::pin(stream::select(
        stream::poll_fn(move |cx| interrupt.poll_recv(cx).map(|o| o.map(|_| Signals::SigInt))),
        stream::select(
            stream::poll_fn(move |cx| quit.poll_recv(cx).map(|o| o.map(|_| Signals::SigQuit))),
            stream::poll_fn(move |cx| terminate.poll_recv(cx).map(|o| o.map(|_| Signals::SigTerm))),
        ),
    )))
}

/// Register desired signals.
#[cfg(windows)]
pub fn register_signals() -> Result<SignalStream> {
    let mut ctrl_c = tokio::signal::windows::ctrl_c()?;
    let mut ctrl_break = tokio::signal::windows::ctrl_break()?;
    Ok(Box::pin(stream::select(
        stream::poll_fn(move |cx| ctrl_c.poll_recv(cx).map(|o| o.map(|_| Signals::SigInt))),
        stream::poll_fn(move |cx| ctrl_break.poll_recv(cx).map(|o| o.map(|_| Signals::SigBreak))),
    )))
}

/// A signal stream that never yields.
pub fn no_signals() -> SignalStream {
    Box::pin(stream::pending())
}

/// Races a future against incoming signals.
pub trait WithSignals<T, E, Fut>
where
    Fut: Send + Future<Output = core::result::Result<T, E>>,
    E: Into<anyhow::Error> + Send + Sync + 'static,
{
    /// Resolves to [`SignalError`] when a signal arrives first. With
    /// `ignore_sigint`, SIGINT is left to the child processes.
    fn with_signals(self, signals: &mut SignalStream, ignore_sigint: bool) -> SignalFuture<'_, T, E, Fut>;
}

impl<T, E, Fut> WithSignals<T, E, Fut> for Fut
where
    Fut: Send + Future<Output = core::result::Result<T, E>>,
    E: Into<anyhow::Error> + Send + Sync + 'static,
{
    fn with_signals(self, signals: &mut SignalStream, ignore_sigint: bool) -> SignalFuture<'_, T, E, Fut> {
        SignalFuture { future: self, signals, ignore_sigint }
    }
}

/// Future returned by [`WithSignals::with_signals`].
#[pin_project]
pub struct SignalFuture<'a, T, E, Fut>
where
    Fut: Send + Future<Output = core::result::Result<T, E>>,
    E: Into<anyhow::Error> + Send + Sync + 'static,
{
    #[pin]
    future: Fut,
    signals: &'a mut SignalStream,
    ignore_sigint: bool,
}

impl<'a, T, E, Fut> Future for SignalFuture<'a, T, E, Fut>
where
    Fut: Send + Future<Output = core::result::Result<T, E>>,
    E: Into<anyhow::Error> + Send + Sync + 'static,
{
    type Output = anyhow::Result<T>;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let this = self.project();
        if let Poll::Ready(result) = this.future.poll(cx) {
            return Poll::Ready(result.map_err(Into::into));
        }
        loop {
            match this.signals.poll_next_unpin(cx) {
                Poll::Ready(Some(Signals::SigInt)) if *this.ignore_sigint => {
                    log::debug!("SIGINT passed to the debugger");
                }
                Poll::Ready(Some(signal)) => {
                    log::info!("Received {:?}, stopping", signal);
                    return Poll::Ready(Err(SignalError.into()));
                }
                // Signal handlers are gone; keep waiting on the future alone.
                Poll::Ready(None) | Poll::Pending => return Poll::Pending,
            }
        }
    }
}

/// The operation was interrupted by a signal.
#[derive(Error, Debug)]
#[error("signal")]
pub struct SignalError;

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn quotes_arguments_with_spaces() {
        let line = command_line(
            Path::new("/opt/st/bin/ST-LINK_gdbserver"),
            &["--port-number".into(), "61234".into(), "/My Tools/bin".into(), "".into()],
        );
        assert_eq!(line, "/opt/st/bin/ST-LINK_gdbserver --port-number 61234 \"/My Tools/bin\" \"\"");
    }

    #[tokio::test]
    async fn signal_interrupts_future() {
        let mut signals: SignalStream = Box::pin(stream::iter(vec![Signals::SigInt]).chain(stream::pending()));
        let future = async {
            tokio::time::sleep(Duration::from_secs(30)).await;
            Ok::<_, std::io::Error>(())
        };
        let err = future.with_signals(&mut signals, false).await.unwrap_err();
        assert!(err.is::<SignalError>());
    }

    #[tokio::test]
    async fn sigint_can_be_ignored() {
        let mut signals: SignalStream = Box::pin(stream::iter(vec![Signals::SigInt]).chain(stream::pending()));
        let future = async {
            tokio::time::sleep(Duration::from_millis(20)).await;
            Ok::<_, std::io::Error>(7)
        };
        assert_eq!(future.with_signals(&mut signals, true).await.unwrap(), 7);
    }

    #[cfg(unix)]
    #[test]
    fn exit_status_codes() {
        use std::os::unix::process::ExitStatusExt;
        let program = Path::new("gdb");
        assert!(ExitStatusError::check(program, ExitStatus::from_raw(0)).is_ok());
        let err = ExitStatusError::check(program, ExitStatus::from_raw(3 << 8)).unwrap_err();
        assert_eq!(err.code(), 3);
        assert_eq!(err.to_string(), "`gdb` exited with status code: 3");
        let err = ExitStatusError::check(program, ExitStatus::from_raw(9)).unwrap_err();
        assert_eq!(err.code(), 1);
    }
}
