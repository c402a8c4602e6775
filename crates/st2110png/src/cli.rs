use std::net::Ipv4Addr;
use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};

use st2110png_core::st2110::Resolution;

#[derive(Parser)]
#[command(
    name = "st2110png",
    about = "Extract a frame of SMPTE ST 2110-20 video from a pcap capture"
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// Write the first complete frame in a capture as a PNG.
    Extract {
        /// Path to the input capture (pcap or pcapng, Ethernet link type).
        #[arg(short, long)]
        input: PathBuf,

        /// Path to write the PNG image.
        #[arg(short, long)]
        output: PathBuf,

        /// Active video format of the flow.
        #[arg(short, long, value_enum, default_value_t = ResolutionArg::P720)]
        resolution: ResolutionArg,

        /// Only decode datagrams sent to this UDP port.
        #[arg(long)]
        dst_port: Option<u16>,

        /// Only decode datagrams sent to this IPv4 address.
        #[arg(long)]
        dst_addr: Option<Ipv4Addr>,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ResolutionArg {
    /// 1280x720 progressive
    #[value(name = "720p")]
    P720,
    /// 1920x1080 interlaced
    #[value(name = "1080i")]
    I1080,
    /// 1920x1080 progressive
    #[value(name = "1080p")]
    P1080,
}

impl From<ResolutionArg> for Resolution {
    fn from(arg: ResolutionArg) -> Self {
        match arg {
            ResolutionArg::P720 => Resolution::P720,
            ResolutionArg::I1080 => Resolution::I1080,
            ResolutionArg::P1080 => Resolution::P1080,
        }
    }
}
