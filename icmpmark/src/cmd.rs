use std::net::Ipv4Addr;

use clap::{Parser, Subcommand, ValueEnum};
use serde::Deserialize;

#[derive(Parser, Debug)]
#[command(disable_help_subcommand = true)]
pub struct Cmd {
    /// Set the log verbose.
    #[arg(
        short = 'v',
        default_value = "info",
        value_name = "verbose",
        global = true,
        value_parser = ["debug", "info", "warn", "error"]
    )]
    pub verbose: String,

    /// One or more ifaces to attach. (e.g. -i lo,eth0...)
    #[arg(short = 'i', value_name = "iface,", value_delimiter = ',', global = true)]
    pub ifaces: Vec<String>,

    /// XDP attach mode, `skb` works on every driver.
    #[arg(short = 'm', value_name = "MODE", value_enum, global = true)]
    pub mode: Option<AttachMode>,

    #[command(subcommand)]
    pub sub_cmd: SubCmd,
}

#[derive(ValueEnum, Deserialize, Copy, Clone, Debug, Default, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum AttachMode {
    /// Generic XDP, runs after the driver built the skb
    #[default]
    Skb,

    /// Native XDP inside the driver
    Drv,

    /// Offloaded to the NIC
    Hw,
}

#[derive(Subcommand, Clone, Debug)]
pub enum SubCmd {
    /// Check whether the icmpmark XDP program can be mounted correctly
    Check,

    /// Attach and print marked packets until interrupted
    Watch,

    /// Running icmpmark as server
    Run(Run),

    /// Send marked ICMP echoes to a host
    Send(Echo),
}

#[derive(Parser, Clone, Debug)]
pub struct Run {
    /// Specify the configuration file to be loaded by icmpmark
    pub config: String,
}

#[derive(Parser, Clone, Debug)]
pub struct Echo {
    /// Destination host
    pub dst: Ipv4Addr,

    /// Port carried by the echoes. Requests hold 16 bits, replies 32.
    #[arg(short = 'p', long, default_value_t = 0)]
    pub port: u32,

    /// Send echo replies, as the server side does
    #[arg(long)]
    pub reply: bool,

    /// How many times the datagram is sent
    #[arg(short = 'n', long, default_value_t = 1)]
    pub count: u32,

    /// Datagram to carry, split into 1450-byte echoes
    #[arg(short = 'd', long, default_value = "")]
    pub data: String,
}
