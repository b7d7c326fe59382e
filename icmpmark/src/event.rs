use std::{fmt::Display, sync::Arc};

use chrono::{DateTime, Local};
use icmpmark_common::MatchEvent;

/// A marked packet reported by the XDP program on one interface.
#[derive(Debug, Clone)]
pub struct MarkEvent {
    pub iface: Arc<str>,
    pub cpu: u32,
    pub len: u64,
    pub at: DateTime<Local>,
}

impl MarkEvent {
    pub fn new(iface: Arc<str>, cpu: u32, event: MatchEvent) -> Self {
        Self {
            iface,
            cpu,
            len: event.len,
            at: Local::now(),
        }
    }

    /// Decodes one perf sample; `None` when it is too short to hold a record.
    pub fn decode(iface: &Arc<str>, cpu: u32, sample: &[u8]) -> Option<Self> {
        MatchEvent::from_bytes(sample).map(|event| Self::new(iface.clone(), cpu, event))
    }
}

impl Display for MarkEvent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "* {:<22}{:<12}cpu={:<5}marked icmp dropped, length={:<5}",
            self.at.format("[%Y-%m-%d %H:%M:%S]").to_string(),
            self.iface,
            self.cpu,
            self.len,
        )
    }
}
