use clap::{Args, Subcommand};
use std::path::PathBuf;

use crate::exit::CliResult;
use crate::output::OutputFormat;

pub mod send;
pub mod version;

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Send one request and print the response.
    Send(SendArgs),
    /// Show version information.
    Version(VersionArgs),
}

pub fn run(command: Command, format: OutputFormat) -> CliResult<i32> {
    match command {
        Command::Send(args) => send::run(args, format),
        Command::Version(args) => version::run(args),
    }
}

#[derive(Args, Debug)]
pub struct SendArgs {
    /// Address to dial: unix!<path> or tcp!<host>!<port>.
    pub address: String,
    /// Request type code.
    #[arg(long = "type", short = 't', value_name = "CODE")]
    pub request_type: u8,
    /// Expected response type code. Default: request type + 1.
    #[arg(long, value_name = "CODE")]
    pub expect: Option<u8>,
    /// Raw string body.
    #[arg(long, conflicts_with_all = ["hex", "file"])]
    pub data: Option<String>,
    /// Hex-encoded body.
    #[arg(long, conflicts_with_all = ["data", "file"])]
    pub hex: Option<String>,
    /// Read body from file.
    #[arg(long, conflicts_with_all = ["data", "hex"])]
    pub file: Option<PathBuf>,
    /// Send untagged; the response is matched by order.
    #[arg(long)]
    pub sequential: bool,
    /// Maximum frame size in bytes, header included.
    #[arg(long, value_name = "BYTES", default_value_t = ixp::frame::DEFAULT_MAX_FRAME_SIZE)]
    pub max_frame_size: usize,
}

#[derive(Args, Debug)]
pub struct VersionArgs {
    /// Show extended build provenance.
    #[arg(long)]
    pub extended: bool,
}
