#![no_std]
#![no_main]

use aya_ebpf::{bindings::xdp_action, macros::xdp, programs::XdpContext};
use aya_log_ebpf::debug;
use icmpmark_common::Verdict;

mod map;
mod mark;
mod util;

#[xdp]
pub fn icmp_mark(ctx: XdpContext) -> u32 {
    match mark::try_mark(&ctx) {
        Verdict::Pass => xdp_action::XDP_PASS,
        Verdict::Drop => xdp_action::XDP_DROP,
        Verdict::Invalid => {
            if util::log_invalid() {
                debug!(&ctx, "malformed frame, len={}", ctx.data_end() - ctx.data());
            }
            xdp_action::XDP_ABORTED
        }
    }
}

#[cfg(not(test))]
#[panic_handler]
fn panic(_info: &core::panic::PanicInfo) -> ! {
    unsafe { core::hint::unreachable_unchecked() }
}
