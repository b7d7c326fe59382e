use aya_ebpf::{macros::map, maps::PerfEventArray};
use icmpmark_common::MatchEvent;

/// One perf ring per CPU; user space opens the slots it cares about.
#[map(name = "ICMP_EVENTS")]
pub(crate) static ICMP_EVENTS: PerfEventArray<MatchEvent> = PerfEventArray::with_max_entries(128, 0);
