use anyhow::Result;
use log::info;
use prometheus::{IntCounterVec, Opts, Registry, TextEncoder};

use crate::event::MarkEvent;

/// Where an event was lost on its way to the application.
#[derive(Debug, Clone, Copy)]
pub enum LossStage {
    /// The per-CPU perf ring was full.
    Kernel,
    /// The application channel was full.
    Channel,
}

impl LossStage {
    fn as_str(&self) -> &'static str {
        match self {
            LossStage::Kernel => "kernel",
            LossStage::Channel => "channel",
        }
    }
}

/// Counters exported by the metrics endpoint. Cloning shares the counters.
#[derive(Clone)]
pub struct Metrics {
    registry: Registry,
    matched_packets: IntCounterVec,
    matched_bytes: IntCounterVec,
    lost_events: IntCounterVec,
    malformed_events: IntCounterVec,
}

impl Metrics {
    pub fn new() -> Result<Self> {
        let registry = Registry::new();

        let matched_packets = IntCounterVec::new(
            Opts::new(
                "icmpmark_matched_packets_total",
                "marked icmp packets dropped by the xdp program",
            ),
            &["iface"],
        )?;
        let matched_bytes = IntCounterVec::new(
            Opts::new(
                "icmpmark_matched_bytes_total",
                "total frame length of the marked icmp packets",
            ),
            &["iface"],
        )?;
        let lost_events = IntCounterVec::new(
            Opts::new(
                "icmpmark_lost_events_total",
                "match events that never reached the application",
            ),
            &["iface", "stage"],
        )?;
        let malformed_events = IntCounterVec::new(
            Opts::new(
                "icmpmark_malformed_events_total",
                "perf samples too short to hold a match event",
            ),
            &["iface"],
        )?;

        registry.register(Box::new(matched_packets.clone()))?;
        registry.register(Box::new(matched_bytes.clone()))?;
        registry.register(Box::new(lost_events.clone()))?;
        registry.register(Box::new(malformed_events.clone()))?;
        info!("success to build icmpmark metrics");

        Ok(Self {
            registry,
            matched_packets,
            matched_bytes,
            lost_events,
            malformed_events,
        })
    }

    pub fn observe_match(&self, event: &MarkEvent) {
        self.matched_packets
            .with_label_values(&[event.iface.as_ref()])
            .inc();
        self.matched_bytes
            .with_label_values(&[event.iface.as_ref()])
            .inc_by(event.len);
    }

    pub fn observe_lost(&self, iface: &str, stage: LossStage, count: u64) {
        self.lost_events
            .with_label_values(&[iface, stage.as_str()])
            .inc_by(count);
    }

    pub fn observe_malformed(&self, iface: &str) {
        self.malformed_events.with_label_values(&[iface]).inc();
    }

    pub fn matched_packets(&self, iface: &str) -> u64 {
        self.matched_packets.with_label_values(&[iface]).get()
    }

    pub fn matched_bytes(&self, iface: &str) -> u64 {
        self.matched_bytes.with_label_values(&[iface]).get()
    }

    pub fn lost_events(&self, iface: &str, stage: LossStage) -> u64 {
        self.lost_events
            .with_label_values(&[iface, stage.as_str()])
            .get()
    }

    /// Text exposition of every counter.
    pub fn export(&self) -> Result<String> {
        let text_enc = TextEncoder::new();
        Ok(text_enc.encode_to_string(&self.registry.gather())?)
    }
}
