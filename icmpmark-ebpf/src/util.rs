use aya_ebpf::programs::XdpContext;
use icmpmark_common::{EventSink, Frame, MatchEvent};

use crate::map::ICMP_EVENTS;

/// Set to 1 by the loader to log every malformed frame. Off unless user space
/// runs at debug level, logging costs a perf write per frame.
#[no_mangle]
static LOG_INVALID: u8 = 0;

#[inline(always)]
pub fn log_invalid() -> bool {
    unsafe { core::ptr::read_volatile(&LOG_INVALID) != 0 }
}

/// Exposes the packet window of an XDP context to the inspection core.
pub struct XdpFrame<'a> {
    ctx: &'a XdpContext,
}

impl<'a> XdpFrame<'a> {
    #[inline(always)]
    pub fn new(ctx: &'a XdpContext) -> Self {
        Self { ctx }
    }
}

// The kernel hands us [data, data_end) for the lifetime of the program run.
unsafe impl Frame for XdpFrame<'_> {
    #[inline(always)]
    fn data(&self) -> usize {
        self.ctx.data()
    }

    #[inline(always)]
    fn data_end(&self) -> usize {
        self.ctx.data_end()
    }
}

/// Publishes into the ring of the CPU the program is running on.
pub struct PerfSink<'a> {
    ctx: &'a XdpContext,
}

impl<'a> PerfSink<'a> {
    #[inline(always)]
    pub fn new(ctx: &'a XdpContext) -> Self {
        Self { ctx }
    }
}

impl EventSink for PerfSink<'_> {
    #[inline(always)]
    fn publish(&self, event: &MatchEvent) {
        // a full ring makes the helper fail; the sample is lost and that is fine
        ICMP_EVENTS.output(self.ctx, event, 0);
    }
}
