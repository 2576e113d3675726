use std::os::fd::RawFd;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use clap::{Args, Subcommand};
use paychannel_transport::IpcStream;

use crate::exit::{transport_error, CliError, CliResult, INTERNAL};
use crate::output::OutputFormat;

pub mod echo;
pub mod listen;
pub mod send;
pub mod version;

/// How long a blocked read waits before re-checking for Ctrl-C.
const POLL_INTERVAL: Duration = Duration::from_millis(200);

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Echo every notification back to the sender.
    Echo(EchoArgs),
    /// Send a single notification.
    Send(SendArgs),
    /// Print received notifications.
    Listen(ListenArgs),
    /// Show version information.
    Version(VersionArgs),
}

pub fn run(command: Command, format: OutputFormat) -> CliResult<i32> {
    match command {
        Command::Echo(args) => echo::run(args),
        Command::Send(args) => send::run(args),
        Command::Listen(args) => listen::run(args, format),
        Command::Version(args) => version::run(args),
    }
}

#[derive(Args, Debug)]
pub struct EchoArgs {
    /// Descriptor to read notifications from.
    #[arg(long, value_name = "FD", default_value_t = 0, env = "PAYCHANNEL_CONSUMER_FD")]
    pub consumer_fd: RawFd,
    /// Descriptor to write replies to.
    #[arg(long, value_name = "FD", default_value_t = 1, env = "PAYCHANNEL_PRODUCER_FD")]
    pub producer_fd: RawFd,
}

#[derive(Args, Debug)]
pub struct SendArgs {
    /// Descriptor to write the notification to.
    #[arg(long, value_name = "FD", default_value_t = 1, env = "PAYCHANNEL_PRODUCER_FD")]
    pub producer_fd: RawFd,
    /// Event name placed in the header.
    #[arg(long, default_value = "dataProducer.send")]
    pub event: String,
    /// JSON object for the header's `data` field.
    #[arg(long, value_name = "JSON")]
    pub data: Option<String>,
    /// JSON object for the header's `internal` field.
    #[arg(long, value_name = "JSON")]
    pub internal: Option<String>,
    /// Payload as a string.
    #[arg(long, conflicts_with = "payload_file")]
    pub payload: Option<String>,
    /// Read the payload from a file.
    #[arg(long, value_name = "PATH", conflicts_with = "payload")]
    pub payload_file: Option<PathBuf>,
}

#[derive(Args, Debug)]
pub struct ListenArgs {
    /// Descriptor to read notifications from.
    #[arg(long, value_name = "FD", default_value_t = 0, env = "PAYCHANNEL_CONSUMER_FD")]
    pub consumer_fd: RawFd,
    /// Exit after printing N notifications.
    #[arg(long)]
    pub count: Option<usize>,
}

#[derive(Args, Debug)]
pub struct VersionArgs {
    /// Also print the build target and wire protocol constants.
    #[arg(long)]
    pub extended: bool,
}

/// Take ownership of a descriptor inherited from the parent process.
fn adopt_fd(fd: RawFd, role: &str) -> CliResult<IpcStream> {
    // SAFETY: the descriptor number comes from the command line and nothing
    // else in this process reads or writes it once the CLI starts a command.
    unsafe { IpcStream::from_raw_fd_checked(fd) }
        .map_err(|err| transport_error(&format!("cannot use {role} fd {fd}"), err))
}

fn install_ctrlc_handler(running: Arc<AtomicBool>) -> CliResult<()> {
    ctrlc::set_handler(move || {
        running.store(false, Ordering::SeqCst);
    })
    .map_err(|err| CliError::new(INTERNAL, format!("signal handler setup failed: {err}")))
}
