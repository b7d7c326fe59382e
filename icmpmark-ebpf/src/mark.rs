use aya_ebpf::programs::XdpContext;
use icmpmark_common::{inspect, Verdict};

use crate::util::{PerfSink, XdpFrame};

#[inline(always)]
pub(crate) fn try_mark(ctx: &XdpContext) -> Verdict {
    inspect(&XdpFrame::new(ctx), &PerfSink::new(ctx))
}
