//! Read-only header projections.
//!
//! Multi-byte fields are kept exactly as they sit on the wire and only
//! converted in the accessors, so the views can be copied straight out of a
//! frame without any layout assumptions beyond `repr(C)`.

use core::mem;

use network_types::{
    eth::{EthHdr, EtherType},
    ip::{IpProto, Ipv4Hdr},
};

#[repr(C)]
#[derive(Debug, Clone, Copy)]
pub struct EthView {
    pub dst_addr: [u8; 6],
    pub src_addr: [u8; 6],
    ether_type: u16,
}

impl EthView {
    pub const LEN: usize = EthHdr::LEN;

    /// Ethertype in host order.
    #[inline(always)]
    pub fn ether_type(&self) -> u16 {
        u16::from_be(self.ether_type)
    }

    #[inline(always)]
    pub fn is_ipv4(&self) -> bool {
        self.ether_type == EtherType::Ipv4 as u16
    }
}

#[repr(C)]
#[derive(Debug, Clone, Copy)]
pub struct Ipv4View {
    version_ihl: u8,
    pub tos: u8,
    /// Network order, like `id`, `frag_off` and `check`.
    pub tot_len: u16,
    pub id: u16,
    pub frag_off: u16,
    pub ttl: u8,
    proto: u8,
    pub check: u16,
    pub src_addr: [u8; 4],
    pub dst_addr: [u8; 4],
}

impl Ipv4View {
    /// Size of the fixed part; options follow when `ihl > 5`.
    pub const LEN: usize = Ipv4Hdr::LEN;

    /// Header length in 32-bit words, straight from the packet.
    #[inline(always)]
    pub fn ihl(&self) -> u8 {
        self.version_ihl & 0x0f
    }

    /// Header length in bytes, options included.
    #[inline(always)]
    pub fn header_len(&self) -> usize {
        self.ihl() as usize * 4
    }

    #[inline(always)]
    pub fn protocol(&self) -> u8 {
        self.proto
    }

    #[inline(always)]
    pub fn is_icmp(&self) -> bool {
        self.proto == IpProto::Icmp as u8
    }
}

/// Echo-style ICMP header followed by the two words carrying the marker.
#[repr(C)]
#[derive(Debug, Clone, Copy)]
pub struct IcmpView {
    pub icmp_type: u8,
    pub code: u8,
    /// Network order; never verified.
    pub checksum: u16,
    id: u16,
    seq: u16,
    signature: [u32; 2],
}

impl IcmpView {
    pub const LEN: usize = mem::size_of::<Self>();

    /// Offset of the first signature word from the start of the ICMP header.
    pub const SIGNATURE_OFFSET: usize = 8;

    #[inline(always)]
    pub fn id(&self) -> u16 {
        u16::from_be(self.id)
    }

    #[inline(always)]
    pub fn seq(&self) -> u16 {
        u16::from_be(self.seq)
    }

    /// The two marker words as read from the frame, without byte swapping.
    #[inline(always)]
    pub fn signature(&self) -> [u32; 2] {
        self.signature
    }
}

const _: () = assert!(mem::size_of::<EthView>() == EthView::LEN);
const _: () = assert!(mem::size_of::<Ipv4View>() == Ipv4View::LEN);
const _: () = assert!(IcmpView::LEN == IcmpView::SIGNATURE_OFFSET + 8);
