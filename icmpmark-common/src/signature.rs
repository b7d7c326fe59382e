use crate::header::IcmpView;

/// The pair of 32-bit words an ICMP packet must carry to be treated as marked.
///
/// The words are defined by the bytes they occupy on the wire and compared
/// against the frame in native byte order, so no swapping happens on either
/// side. On little-endian hosts the default marker reads as
/// `[0x706d6369, 0x70647532]`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Signature([u32; 2]);

impl Signature {
    /// `"icmp2udp"`, written right after the echo id and sequence.
    pub const MARK: Signature = Signature::from_wire(*b"icmp2udp");

    pub const fn from_wire(bytes: [u8; 8]) -> Self {
        Self([
            u32::from_ne_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]),
            u32::from_ne_bytes([bytes[4], bytes[5], bytes[6], bytes[7]]),
        ])
    }

    /// The bytes the marker occupies on the wire.
    pub const fn to_wire(&self) -> [u8; 8] {
        let [a, b, c, d] = self.0[0].to_ne_bytes();
        let [e, f, g, h] = self.0[1].to_ne_bytes();
        [a, b, c, d, e, f, g, h]
    }

    /// Both words must be equal, there is no partial match.
    #[inline(always)]
    pub fn matches(&self, icmp: &IcmpView) -> bool {
        let [g, l] = icmp.signature();
        g == self.0[0] && l == self.0[1]
    }
}
