use core::mem;

/// Record published for every dropped marked packet: the frame length in bytes.
///
/// Exactly eight bytes in the publisher's native byte order, nothing else.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MatchEvent {
    pub len: u64,
}

impl MatchEvent {
    pub const LEN: usize = mem::size_of::<Self>();

    pub fn new(len: u64) -> Self {
        Self { len }
    }

    /// Decodes a record from a sample buffer. Anything past the first eight
    /// bytes is ignored, shorter buffers are rejected.
    pub fn from_bytes(buf: &[u8]) -> Option<Self> {
        let raw: [u8; Self::LEN] = buf.get(..Self::LEN)?.try_into().ok()?;
        Some(Self::new(u64::from_ne_bytes(raw)))
    }

    pub fn to_bytes(&self) -> [u8; Self::LEN] {
        self.len.to_ne_bytes()
    }
}

/// Out-of-band channel matches are reported to.
///
/// Publishing is fire-and-forget: an implementation must not block and must
/// silently discard the record when it has no room for it.
pub trait EventSink {
    fn publish(&self, event: &MatchEvent);
}
