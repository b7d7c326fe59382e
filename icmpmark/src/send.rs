use std::{
    io, mem,
    net::Ipv4Addr,
    os::fd::{AsRawFd, FromRawFd, OwnedFd},
};

use anyhow::{anyhow, Context, Result};
use colored::Colorize;
use icmpmark_common::MarkedEcho;
use log::{debug, info};

use crate::cmd::Echo;

/// Raw ICMPv4 socket, the kernel adds the IPv4 header.
pub struct EchoSocket {
    fd: OwnedFd,
}

impl EchoSocket {
    pub fn open() -> Result<Self> {
        let fd = unsafe { libc::socket(libc::AF_INET, libc::SOCK_RAW, libc::IPPROTO_ICMP) };
        if fd < 0 {
            return Err(io::Error::last_os_error())
                .context("failed to open a raw icmp socket (CAP_NET_RAW is required)");
        }

        Ok(Self {
            fd: unsafe { OwnedFd::from_raw_fd(fd) },
        })
    }

    pub fn send_to(&self, packet: &[u8], dst: Ipv4Addr) -> io::Result<usize> {
        let addr = libc::sockaddr_in {
            sin_family: libc::AF_INET as libc::sa_family_t,
            sin_port: 0,
            sin_addr: libc::in_addr {
                s_addr: u32::from_ne_bytes(dst.octets()),
            },
            sin_zero: [0; 8],
        };

        let ret = unsafe {
            libc::sendto(
                self.fd.as_raw_fd(),
                packet.as_ptr() as *const libc::c_void,
                packet.len(),
                0,
                &addr as *const libc::sockaddr_in as *const libc::sockaddr,
                mem::size_of::<libc::sockaddr_in>() as libc::socklen_t,
            )
        };
        if ret < 0 {
            return Err(io::Error::last_os_error());
        }

        Ok(ret as usize)
    }
}

/// Header fields for the echoes, the way a client or a server of the
/// ICMP transport fills them in.
pub fn marked_echo(args: &Echo) -> Result<MarkedEcho> {
    if args.reply {
        return Ok(MarkedEcho::reply(args.port));
    }

    let port = u16::try_from(args.port)
        .map_err(|_| anyhow!("port={} does not fit an echo request", args.port))?;
    Ok(MarkedEcho::request(std::process::id() as u16, port))
}

/// ICMP messages for one datagram. An empty datagram still gets a bare
/// marked echo so there is something to send.
pub fn encode(echo: MarkedEcho, data: &[u8]) -> Vec<Vec<u8>> {
    let encode_one = |chunk: &[u8]| {
        let mut buf = vec![0u8; MarkedEcho::encoded_len(chunk.len())];
        echo.encode(chunk, &mut buf).map(|len| {
            buf.truncate(len);
            buf
        })
    };

    if data.is_empty() {
        return encode_one(&[]).into_iter().collect();
    }
    MarkedEcho::chunks(data).filter_map(encode_one).collect()
}

/// Sends the datagram `count` times to the destination.
pub fn send(args: &Echo) -> Result<()> {
    let echo = marked_echo(args)?;
    let packets = encode(echo, args.data.as_bytes());
    let socket = EchoSocket::open()?;

    for round in 0..args.count {
        for packet in packets.iter() {
            socket
                .send_to(packet, args.dst)
                .with_context(|| format!("failed to send a marked echo to {}", args.dst))?;
            debug!(
                "round {}: sent {} bytes to {}, type={} id={} seq={}",
                round,
                packet.len(),
                args.dst,
                echo.icmp_type(),
                echo.id(),
                echo.seq()
            );
        }
    }

    info!("sent {} marked echoes to {}", packets.len() as u64 * args.count as u64, args.dst);
    println!(
        "{}",
        format!(
            "{} marked echo(es) of {} bytes of data sent to {}",
            packets.len(),
            args.data.len(),
            args.dst
        )
        .bright_green()
    );

    Ok(())
}
