use std::sync::Arc;

use anyhow::{anyhow, Context, Result};
use aya::{
    include_bytes_aligned,
    maps::perf::{AsyncPerfEventArray, Events},
    programs::{xdp::XdpLinkId, Xdp, XdpFlags},
    util::online_cpus,
    Ebpf, EbpfLoader,
};
use aya_log::EbpfLogger;
use bytes::BytesMut;
use icmpmark_common::{MatchEvent, EVENT_MAP, LOG_INVALID, PROGRAM_NAME};
use libc::{self, c_int};
use log::{debug, error, info, warn, LevelFilter};
use tokio::{
    sync::mpsc::{self, error::TrySendError},
    task::JoinSet,
};

use crate::{
    cmd::AttachMode,
    event::MarkEvent,
    metrics::{LossStage, Metrics},
};

/// Samples drained per wakeup of a perf reader.
const READ_BATCH: usize = 16;

impl From<AttachMode> for XdpFlags {
    fn from(mode: AttachMode) -> Self {
        match mode {
            AttachMode::Skb => XdpFlags::SKB_MODE,
            AttachMode::Drv => XdpFlags::DRV_MODE,
            AttachMode::Hw => XdpFlags::HW_MODE,
        }
    }
}

/// The XDP program attached to one interface together with its perf readers.
///
/// Dropping the session without [`XdpSession::detach`] still releases the
/// link, but detaching logs the outcome.
pub struct XdpSession {
    iface: Arc<str>,
    ebpf: Ebpf,
    link: Option<XdpLinkId>,
    readers: JoinSet<()>,
}

impl XdpSession {
    pub fn attach(iface: &str, mode: AttachMode) -> Result<Self> {
        let ret = set_rlimit();
        if ret != 0 {
            error!("remove limit on locked memory failed, ret is: {}", ret);
        }

        let log_invalid = log_invalid_flag(log::max_level());
        let mut ebpf = EbpfLoader::new()
            .set_global(LOG_INVALID, &log_invalid, true)
            .load(include_bytes_aligned!(concat!(
                env!("OUT_DIR"),
                "/",
                env!("CARGO_PKG_NAME"),
            )))
            .context("failed to load the eBPF program(XDP) bytecode")?;

        if let Err(e) = EbpfLogger::init(&mut ebpf) {
            warn!("failed to initialize eBPF logger for {}: {}", iface, e);
        }

        let prog: &mut Xdp = ebpf
            .program_mut(PROGRAM_NAME)
            .ok_or_else(|| anyhow!("program '{}' not found", PROGRAM_NAME))?
            .try_into()
            .with_context(|| format!("program '{}' is not an XDP program", PROGRAM_NAME))?;
        prog.load()
            .context("failed to load the eBPF program(XDP) to the kernel")?;

        let link = prog.attach(iface, mode.into()).with_context(|| {
            format!(
                "failed to attach the eBPF program(XDP) to the {} network interface in {:?} mode",
                iface, mode
            )
        })?;
        info!(
            "success to attach the eBPF program(XDP) to the {} network interface in {:?} mode!",
            iface, mode
        );

        Ok(Self {
            iface: Arc::from(iface),
            ebpf,
            link: Some(link),
            readers: JoinSet::new(),
        })
    }

    pub fn iface(&self) -> &str {
        &self.iface
    }

    /// Opens the perf ring of every online CPU and forwards decoded events to `tx`.
    pub fn spawn_readers(
        &mut self,
        perf_pages: usize,
        tx: mpsc::Sender<MarkEvent>,
        metrics: Metrics,
    ) -> Result<()> {
        let map = self
            .ebpf
            .take_map(EVENT_MAP)
            .ok_or_else(|| anyhow!("map '{}' not found", EVENT_MAP))?;
        let mut events = AsyncPerfEventArray::try_from(map)
            .with_context(|| format!("map '{}' is not a perf event array", EVENT_MAP))?;

        let cpus = online_cpus().map_err(|(msg, err)| anyhow!("{msg}: {err}"))?;
        for cpu in cpus {
            let mut buf = events
                .open(cpu, Some(perf_pages))
                .with_context(|| format!("failed to open perf buffer on CPU {cpu}"))?;
            let (iface, tx, metrics) = (self.iface.clone(), tx.clone(), metrics.clone());

            self.readers.spawn(async move {
                let mut buffers = (0..READ_BATCH)
                    .map(|_| BytesMut::with_capacity(MatchEvent::LEN))
                    .collect::<Vec<_>>();

                loop {
                    let Events { read, lost } = match buf.read_events(&mut buffers).await {
                        Ok(events) => events,
                        Err(e) => {
                            error!("perf buffer of {} on CPU {} failed by error: {}", iface, cpu, e);
                            return;
                        }
                    };

                    if lost > 0 {
                        warn!("{} events lost in the perf buffer of {} on CPU {}", lost, iface, cpu);
                        metrics.observe_lost(&iface, LossStage::Kernel, lost as u64);
                    }

                    for sample in buffers.iter_mut().take(read) {
                        match MarkEvent::decode(&iface, cpu, sample) {
                            Some(event) => forward(&tx, event, &metrics),
                            None => {
                                debug!("undersized perf sample of {} bytes on {}", sample.len(), iface);
                                metrics.observe_malformed(&iface);
                            }
                        }
                        sample.clear();
                    }
                }
            });
        }
        debug!("spawned {} perf readers for {}", self.readers.len(), self.iface);

        Ok(())
    }

    pub fn detach(mut self) {
        self.readers.abort_all();

        let Some(link) = self.link.take() else {
            return;
        };
        let prog: Option<&mut Xdp> = self
            .ebpf
            .program_mut(PROGRAM_NAME)
            .and_then(|prog| prog.try_into().ok());
        match prog.map(|prog| prog.detach(link)) {
            Some(Ok(())) => info!("detached the eBPF program(XDP) from {}", self.iface),
            Some(Err(e)) => error!("failed to detach from {} by error: {}", self.iface, e),
            None => error!("program '{}' vanished before detach", PROGRAM_NAME),
        }
    }
}

/// Never waits for the application: a full channel loses the event.
fn forward(tx: &mpsc::Sender<MarkEvent>, event: MarkEvent, metrics: &Metrics) {
    match tx.try_send(event) {
        Ok(()) => {}
        Err(TrySendError::Full(event)) => {
            metrics.observe_lost(&event.iface, LossStage::Channel, 1);
        }
        Err(TrySendError::Closed(_)) => {}
    }
}

/// The XDP program logs malformed frames only when debug output is shown.
fn log_invalid_flag(level: LevelFilter) -> u8 {
    (level >= LevelFilter::Debug) as u8
}

fn set_rlimit() -> c_int {
    let rlim = libc::rlimit {
        rlim_cur: libc::RLIM_INFINITY,
        rlim_max: libc::RLIM_INFINITY,
    };

    unsafe { libc::setrlimit(libc::RLIMIT_MEMLOCK, &rlim) }
}

#[cfg(test)]
mod test {
    use std::sync::Arc;

    use icmpmark_common::MatchEvent;
    use log::LevelFilter;
    use tokio::sync::mpsc;

    use crate::{
        event::MarkEvent,
        metrics::{LossStage, Metrics},
    };

    use super::{forward, log_invalid_flag};

    #[test]
    fn test_kernel_logging_follows_level() {
        assert_eq!(log_invalid_flag(LevelFilter::Info), 0);
        assert_eq!(log_invalid_flag(LevelFilter::Warn), 0);
        assert_eq!(log_invalid_flag(LevelFilter::Debug), 1);
        assert_eq!(log_invalid_flag(LevelFilter::Trace), 1);
    }

    #[test]
    fn test_forward_drops_when_full() {
        let metrics = Metrics::new().unwrap();
        let (tx, mut rx) = mpsc::channel(1);
        let iface: Arc<str> = Arc::from("eth0");

        forward(&tx, MarkEvent::new(iface.clone(), 0, MatchEvent::new(50)), &metrics);
        forward(&tx, MarkEvent::new(iface.clone(), 0, MatchEvent::new(60)), &metrics);

        assert_eq!(rx.try_recv().unwrap().len, 50);
        assert!(rx.try_recv().is_err());
        assert_eq!(metrics.lost_events("eth0", LossStage::Channel), 1);
    }
}
