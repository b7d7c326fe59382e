//! Encoder for the marked ICMP echoes that carry datagrams over ICMP.
//!
//! Every echo is an 8-byte echo header, the [`Signature::MARK`] words and at
//! most [`MAX_PAYLOAD`] bytes of payload. These are exactly the frames the
//! XDP program recognises and drops.

use crate::{header::IcmpView, signature::Signature};

pub const ICMP_ECHO_REPLY: u8 = 0;
pub const ICMP_ECHO_REQUEST: u8 = 8;

/// Largest payload a single marked echo carries.
pub const MAX_PAYLOAD: usize = 1450;

/// Header fields of one marked echo.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MarkedEcho {
    icmp_type: u8,
    id: u16,
    seq: u16,
}

impl MarkedEcho {
    /// Echo request sent by a client: `id` names the sender, `seq` carries the
    /// destination port.
    pub const fn request(id: u16, port: u16) -> Self {
        Self {
            icmp_type: ICMP_ECHO_REQUEST,
            id,
            seq: port,
        }
    }

    /// Echo reply sent by a server: the 32-bit port is split high half into
    /// `id`, low half into `seq`.
    pub const fn reply(port: u32) -> Self {
        Self {
            icmp_type: ICMP_ECHO_REPLY,
            id: (port >> 16) as u16,
            seq: port as u16,
        }
    }

    pub fn icmp_type(&self) -> u8 {
        self.icmp_type
    }

    pub fn id(&self) -> u16 {
        self.id
    }

    pub fn seq(&self) -> u16 {
        self.seq
    }

    /// Size of the ICMP message for a payload of `payload_len` bytes.
    pub const fn encoded_len(payload_len: usize) -> usize {
        IcmpView::LEN + payload_len
    }

    /// Writes the ICMP message for `payload` to the front of `out` and returns
    /// its length, checksum included.
    ///
    /// `None` when the payload is longer than [`MAX_PAYLOAD`] or `out` cannot
    /// hold the message.
    pub fn encode(&self, payload: &[u8], out: &mut [u8]) -> Option<usize> {
        if payload.len() > MAX_PAYLOAD {
            return None;
        }
        let len = Self::encoded_len(payload.len());
        let buf = out.get_mut(..len)?;

        buf[0] = self.icmp_type;
        buf[1] = 0;
        buf[2..4].copy_from_slice(&[0, 0]);
        buf[4..6].copy_from_slice(&self.id.to_be_bytes());
        buf[6..8].copy_from_slice(&self.seq.to_be_bytes());
        buf[IcmpView::SIGNATURE_OFFSET..IcmpView::LEN].copy_from_slice(&Signature::MARK.to_wire());
        buf[IcmpView::LEN..].copy_from_slice(payload);

        let sum = checksum(buf);
        buf[2..4].copy_from_slice(&sum.to_be_bytes());

        Some(len)
    }

    /// Splits a datagram into the payloads of consecutive echoes. An empty
    /// datagram yields no echo at all.
    pub fn chunks(data: &[u8]) -> core::slice::Chunks<'_, u8> {
        data.chunks(MAX_PAYLOAD)
    }
}

/// Internet checksum (RFC 1071) over `bytes`, an odd tail is padded with zero.
pub fn checksum(bytes: &[u8]) -> u16 {
    let mut words = bytes.chunks_exact(2);
    let mut sum = (&mut words).fold(0u32, |sum, word| {
        sum + u16::from_be_bytes([word[0], word[1]]) as u32
    });
    if let [last] = words.remainder() {
        sum += (*last as u32) << 8;
    }

    while sum >> 16 != 0 {
        sum = (sum & 0xffff) + (sum >> 16);
    }

    !(sum as u16)
}
