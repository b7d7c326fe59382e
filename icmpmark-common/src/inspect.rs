use crate::{
    event::{EventSink, MatchEvent},
    frame::{Cursor, Frame},
    header::{EthView, IcmpView, Ipv4View},
    signature::Signature,
};

/// Outcome of inspecting one frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    /// Not interesting, let it through untouched.
    Pass,
    /// Marked packet: reported and consumed.
    Drop,
    /// A header did not fit in the frame.
    Invalid,
}

/// Runs the whole pipeline over one frame.
///
/// The frame length is taken before any header is read and is what gets
/// published on a match. A sink that cannot take the record does not change
/// the verdict.
#[inline(always)]
pub fn inspect<F, S>(frame: &F, sink: &S) -> Verdict
where
    F: Frame + ?Sized,
    S: EventSink + ?Sized,
{
    let packet_size = frame.len() as u64;

    let icmp = match walk(frame) {
        Ok(icmp) => icmp,
        Err(verdict) => return verdict,
    };

    if !Signature::MARK.matches(&icmp) {
        return Verdict::Pass;
    }

    sink.publish(&MatchEvent::new(packet_size));
    Verdict::Drop
}

/// Walks Ethernet, IPv4 and ICMP and returns the ICMP view.
///
/// `Err` carries the terminal verdict when the walk stops early: `Pass` for
/// traffic that is not IPv4/ICMP, `Invalid` when a header is cut short.
#[inline(always)]
pub fn walk<F>(frame: &F) -> Result<IcmpView, Verdict>
where
    F: Frame + ?Sized,
{
    let mut cursor = Cursor::new(frame);

    let eth: EthView = cursor.view().ok_or(Verdict::Invalid)?;
    if !eth.is_ipv4() {
        return Err(Verdict::Pass);
    }
    cursor.advance(EthView::LEN).ok_or(Verdict::Invalid)?;

    let ip: Ipv4View = cursor.view().ok_or(Verdict::Invalid)?;
    if !ip.is_icmp() {
        return Err(Verdict::Pass);
    }
    // ihl comes from the sender, it is only trusted once the guard agrees
    cursor
        .advance_over::<Ipv4View>(ip.header_len())
        .ok_or(Verdict::Invalid)?;

    cursor.view().ok_or(Verdict::Invalid)
}

#[cfg(test)]
mod test {
    use std::{
        cell::{Cell, RefCell},
        mem,
    };

    use crate::{EthView, EventSink, Frame, IcmpView, Ipv4View, MarkedEcho, MatchEvent, MAX_PAYLOAD};

    use super::{inspect, walk, Verdict};

    const ETH_P_IP: u16 = 0x0800;
    const ETH_P_ARP: u16 = 0x0806;
    const ETH_P_IPV6: u16 = 0x86dd;

    #[derive(Default)]
    struct RecordingSink {
        events: RefCell<Vec<u64>>,
    }

    impl EventSink for RecordingSink {
        fn publish(&self, event: &MatchEvent) {
            self.events.borrow_mut().push(event.len);
        }
    }

    impl RecordingSink {
        fn events(&self) -> Vec<u64> {
            self.events.borrow().clone()
        }
    }

    /// Stands in for a channel that is always full.
    struct FullSink;

    impl EventSink for FullSink {
        fn publish(&self, _event: &MatchEvent) {}
    }

    /// Remembers the furthest byte any load touched.
    struct TrackedFrame<'a> {
        bytes: &'a [u8],
        high_water: Cell<usize>,
    }

    impl<'a> TrackedFrame<'a> {
        fn new(bytes: &'a [u8]) -> Self {
            Self {
                bytes,
                high_water: Cell::new(0),
            }
        }
    }

    unsafe impl Frame for TrackedFrame<'_> {
        fn data(&self) -> usize {
            Frame::data(self.bytes)
        }

        fn data_end(&self) -> usize {
            Frame::data_end(self.bytes)
        }

        fn load<T: Copy>(&self, offset: usize) -> Option<T> {
            let value = self.bytes.load::<T>(offset)?;
            let end = offset + mem::size_of::<T>();
            self.high_water.set(self.high_water.get().max(end));
            Some(value)
        }
    }

    /// Ethernet and IPv4 around a marked echo, the tail can be overwritten to
    /// knock the marker out.
    struct FrameBuilder {
        ether_type: u16,
        ihl: u8,
        protocol: u8,
        echo: MarkedEcho,
        tail: Option<[u8; 8]>,
        payload: usize,
    }

    impl Default for FrameBuilder {
        fn default() -> Self {
            Self {
                ether_type: ETH_P_IP,
                ihl: 5,
                protocol: 1,
                echo: MarkedEcho::request(0x1234, 1),
                tail: None,
                payload: 0,
            }
        }
    }

    impl FrameBuilder {
        fn ether_type(mut self, ether_type: u16) -> Self {
            self.ether_type = ether_type;
            self
        }

        fn ihl(mut self, ihl: u8) -> Self {
            self.ihl = ihl;
            self
        }

        fn protocol(mut self, protocol: u8) -> Self {
            self.protocol = protocol;
            self
        }

        fn echo(mut self, echo: MarkedEcho) -> Self {
            self.echo = echo;
            self
        }

        fn tail(mut self, tail: &[u8; 8]) -> Self {
            self.tail = Some(*tail);
            self
        }

        fn payload(mut self, payload: usize) -> Self {
            self.payload = payload;
            self
        }

        fn build(self) -> Vec<u8> {
            let mut buf = Vec::new();

            buf.extend_from_slice(&[0x02, 0, 0, 0, 0, 0x02]);
            buf.extend_from_slice(&[0x02, 0, 0, 0, 0, 0x01]);
            buf.extend_from_slice(&self.ether_type.to_be_bytes());

            // options are padded with NOPs so the header really is ihl words long
            let ip_len = (self.ihl as usize * 4).max(Ipv4View::LEN);
            let mut ip = vec![0x01u8; ip_len];
            ip[..Ipv4View::LEN].copy_from_slice(&[
                0x40 | self.ihl,
                0,
                0,
                0,
                0,
                0,
                0x40,
                0,
                64,
                self.protocol,
                0,
                0,
                192,
                168,
                0,
                1,
                192,
                168,
                0,
                2,
            ]);
            buf.extend_from_slice(&ip);

            let icmp_at = buf.len();
            let payload = vec![0x5a; self.payload];
            let mut icmp = vec![0u8; MarkedEcho::encoded_len(payload.len())];
            let len = self.echo.encode(&payload, &mut icmp).unwrap();
            buf.extend_from_slice(&icmp[..len]);

            if let Some(tail) = self.tail {
                let at = icmp_at + IcmpView::SIGNATURE_OFFSET;
                buf[at..at + tail.len()].copy_from_slice(&tail);
            }
            buf
        }
    }

    #[test]
    fn test_short_frames_are_invalid() {
        let full = FrameBuilder::default().build();
        for len in 0..EthView::LEN {
            let sink = RecordingSink::default();
            assert_eq!(inspect(&full[..len], &sink), Verdict::Invalid, "len={len}");
            assert!(sink.events().is_empty());
        }
    }

    #[test]
    fn test_non_ipv4_passes_without_reading_past_ethernet() {
        for ether_type in [ETH_P_ARP, ETH_P_IPV6, 0x0008, 0x0000, 0xffff] {
            let buf = FrameBuilder::default()
                .ether_type(ether_type)
                .payload(64)
                .build();
            let frame = TrackedFrame::new(&buf);
            let sink = RecordingSink::default();

            assert_eq!(inspect(&frame, &sink), Verdict::Pass);
            assert_eq!(frame.high_water.get(), EthView::LEN);
            assert!(sink.events().is_empty());
        }
    }

    #[test]
    fn test_non_icmp_passes() {
        for protocol in [0u8, 2, 6, 17, 47, 58, 255] {
            let buf = FrameBuilder::default().protocol(protocol).build();
            let frame = TrackedFrame::new(&buf);
            let sink = RecordingSink::default();

            assert_eq!(inspect(&frame, &sink), Verdict::Pass, "protocol={protocol}");
            assert_eq!(frame.high_water.get(), EthView::LEN + Ipv4View::LEN);
            assert!(sink.events().is_empty());
        }
    }

    #[test]
    fn test_truncated_ipv4_is_invalid() {
        let buf = FrameBuilder::default().build();
        for len in EthView::LEN..EthView::LEN + Ipv4View::LEN {
            assert_eq!(
                inspect(&buf[..len], &RecordingSink::default()),
                Verdict::Invalid,
                "len={len}"
            );
        }
    }

    #[test]
    fn test_truncated_icmp_is_invalid() {
        for ihl in 5..=15u8 {
            let buf = FrameBuilder::default().ihl(ihl).build();
            let needed = EthView::LEN + ihl as usize * 4 + IcmpView::LEN;
            assert_eq!(buf.len(), needed);

            for len in EthView::LEN + Ipv4View::LEN..needed {
                let sink = RecordingSink::default();
                assert_eq!(inspect(&buf[..len], &sink), Verdict::Invalid, "ihl={ihl} len={len}");
                assert!(sink.events().is_empty());
            }

            let sink = RecordingSink::default();
            assert_eq!(inspect(&buf[..], &sink), Verdict::Drop, "ihl={ihl}");
            assert_eq!(sink.events(), vec![needed as u64]);
        }
    }

    #[test]
    fn test_short_ihl_is_invalid() {
        for ihl in 0..5u8 {
            let buf = FrameBuilder::default().ihl(ihl).payload(64).build();
            let sink = RecordingSink::default();
            assert_eq!(inspect(&buf[..], &sink), Verdict::Invalid, "ihl={ihl}");
            assert!(sink.events().is_empty());
        }
    }

    #[test]
    fn test_exact_frame_matches() {
        let buf = FrameBuilder::default().build();
        assert_eq!(buf.len(), 50);

        let sink = RecordingSink::default();
        assert_eq!(inspect(&buf[..], &sink), Verdict::Drop);
        assert_eq!(sink.events(), vec![50]);
    }

    #[test]
    fn test_one_byte_short_is_invalid() {
        let buf = FrameBuilder::default().build();
        let sink = RecordingSink::default();
        assert_eq!(inspect(&buf[..49], &sink), Verdict::Invalid);
        assert!(sink.events().is_empty());
    }

    #[test]
    fn test_exact_frame_without_mark_passes() {
        let buf = FrameBuilder::default().tail(&[0; 8]).build();
        assert_eq!(buf.len(), 50);

        let sink = RecordingSink::default();
        assert_eq!(inspect(&buf[..], &sink), Verdict::Pass);
        assert!(sink.events().is_empty());
    }

    #[test]
    fn test_partial_signature_passes() {
        for tail in [b"icmpXXXX", b"XXXX2udp", b"2udpicmp", b"ICMP2UDP"] {
            let buf = FrameBuilder::default().tail(tail).payload(32).build();
            let sink = RecordingSink::default();
            assert_eq!(inspect(&buf[..], &sink), Verdict::Pass);
            assert!(sink.events().is_empty());
        }
    }

    #[test]
    fn test_event_carries_whole_frame_length() {
        let buf = FrameBuilder::default().ihl(6).payload(MAX_PAYLOAD).build();
        let sink = RecordingSink::default();

        assert_eq!(inspect(&buf[..], &sink), Verdict::Drop);
        assert_eq!(sink.events(), vec![buf.len() as u64]);
        assert_eq!(buf.len(), 14 + 24 + 16 + 1450);
    }

    #[test]
    fn test_literal_wire_bytes_match() {
        #[rustfmt::skip]
        let buf: [u8; 50] = [
            // ethernet
            0xff, 0xff, 0xff, 0xff, 0xff, 0xff,
            0x02, 0x00, 0x00, 0x00, 0x00, 0x01,
            0x08, 0x00,
            // ipv4, ihl=5, protocol=1
            0x45, 0x00, 0x00, 0x24, 0x00, 0x00, 0x40, 0x00,
            0x40, 0x01, 0x00, 0x00,
            0x0a, 0x00, 0x00, 0x01,
            0x0a, 0x00, 0x00, 0x02,
            // icmp echo reply
            0x00, 0x00, 0x00, 0x00, 0x00, 0x01, 0x00, 0x02,
            b'i', b'c', b'm', b'p', b'2', b'u', b'd', b'p',
        ];

        let sink = RecordingSink::default();
        assert_eq!(inspect(&buf[..], &sink), Verdict::Drop);
        assert_eq!(sink.events(), vec![50]);
    }

    #[test]
    fn test_inspect_is_pure() {
        let buf = FrameBuilder::default().payload(10).build();
        let sink = RecordingSink::default();

        let first = inspect(&buf[..], &sink);
        let second = inspect(&buf[..], &sink);
        assert_eq!(first, Verdict::Drop);
        assert_eq!(first, second);
        assert_eq!(sink.events(), vec![60, 60]);
    }

    #[test]
    fn test_full_channel_still_drops() {
        let buf = FrameBuilder::default().build();
        assert_eq!(inspect(&buf[..], &FullSink), Verdict::Drop);
    }

    #[test]
    fn test_every_echo_chunk_is_dropped() {
        let data = vec![0x5au8; 2 * MAX_PAYLOAD + 7];
        let sink = RecordingSink::default();

        for (seq, chunk) in MarkedEcho::chunks(&data).enumerate() {
            let echo = MarkedEcho::reply(0x0001_0000 | seq as u32);
            let buf = FrameBuilder::default().echo(echo).payload(chunk.len()).build();
            assert_eq!(inspect(&buf[..], &sink), Verdict::Drop, "seq={seq}");
        }
        assert_eq!(
            sink.events(),
            vec![34 + 16 + MAX_PAYLOAD as u64, 34 + 16 + MAX_PAYLOAD as u64, 34 + 16 + 7]
        );
    }

    #[test]
    fn test_walk_returns_icmp_view() {
        let buf = FrameBuilder::default().ihl(7).build();
        let icmp = walk(&buf[..]).unwrap();
        assert_eq!(icmp.icmp_type, 8);
        assert_eq!(icmp.id(), 0x1234);
        assert_eq!(icmp.seq(), 1);

        let arp = FrameBuilder::default().ether_type(ETH_P_ARP).build();
        assert_eq!(walk(&arp[..]).unwrap_err(), Verdict::Pass);
        assert_eq!(walk(&buf[..10]).unwrap_err(), Verdict::Invalid);
    }
}
