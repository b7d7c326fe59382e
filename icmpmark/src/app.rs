use anyhow::{Context, Result};
use colored::Colorize;
use log::{error, info};
use tokio::sync::mpsc;

use crate::{
    cmd::AttachMode,
    config::Settings,
    ebpf::XdpSession,
    event::MarkEvent,
    metrics::{LossStage, Metrics},
    server,
    util::{self, uname},
};

pub struct Application {
    pub settings: Settings,
    pub metrics: Metrics,

    pub rx: mpsc::Receiver<MarkEvent>,
    pub tx: mpsc::Sender<MarkEvent>,
}

impl Application {
    pub fn new(settings: Settings, metrics: Metrics) -> Self {
        let (tx, rx) = mpsc::channel(settings.channel_capacity);
        Self {
            settings,
            metrics,
            rx,
            tx,
        }
    }

    /// Attaches to every interface and reports marked packets until Ctrl-C.
    pub async fn run(&mut self) -> Result<()> {
        info!(
            "start icmpmark process, mode: {:?}, kernel: {}",
            self.settings.mode,
            uname()
                .map(|info| info.release)
                .unwrap_or_else(|_| "unknown".to_string())
        );
        util::lookup_interface(&self.settings.ifaces)?;

        if let Some(config) = self.settings.metrics.as_ref() {
            let (listen, path) = (config.listen_addr()?, config.path.clone());
            let metrics = self.metrics.clone();
            tokio::spawn(async move {
                if let Err(e) = server::serve(listen, path, metrics).await {
                    error!("{:#}", e);
                }
            });
        }

        let mut sessions = Vec::with_capacity(self.settings.ifaces.len());
        for iface in self.settings.ifaces.iter() {
            let attached = XdpSession::attach(iface, self.settings.mode).and_then(|mut session| {
                session.spawn_readers(
                    self.settings.perf_pages,
                    self.fork_tx(),
                    self.metrics.clone(),
                )?;
                Ok(session)
            });
            match attached {
                Ok(session) => sessions.push(session),
                Err(e) => {
                    sessions.into_iter().for_each(XdpSession::detach);
                    return Err(e);
                }
            }
        }

        let mut tick = tokio::time::interval(self.settings.report_interval()?);
        tick.tick().await;
        let shutdown = tokio::signal::ctrl_c();
        tokio::pin!(shutdown);

        loop {
            tokio::select! {
                Some(event) = self.rx.recv() => handle(&self.metrics, event),
                _ = tick.tick() => report(&self.metrics, &self.settings.ifaces),
                ret = &mut shutdown => {
                    if let Err(e) = ret {
                        error!("failed to listen for ctrl-c by error: {}", e);
                    }
                    break;
                }
            }
        }

        info!("shutting down");
        sessions.into_iter().for_each(XdpSession::detach);

        Ok(())
    }

    fn fork_tx(&self) -> mpsc::Sender<MarkEvent> {
        self.tx.clone()
    }
}

pub fn handle(metrics: &Metrics, event: MarkEvent) {
    metrics.observe_match(&event);

    if log::log_enabled!(log::Level::Debug) {
        println!("{}", event.to_string().bright_red());
    } else {
        info!(
            "marked icmp packet dropped on {} (cpu {}), length={}",
            event.iface, event.cpu, event.len
        );
    }
}

pub fn report(metrics: &Metrics, ifaces: &[String]) {
    for iface in ifaces.iter() {
        info!(
            "{}: {} marked packets, {} bytes, {} events lost",
            iface,
            metrics.matched_packets(iface),
            metrics.matched_bytes(iface),
            metrics.lost_events(iface, LossStage::Kernel)
                + metrics.lost_events(iface, LossStage::Channel),
        );
    }
}

/// Attaches to each interface and detaches again right away.
pub fn check(ifaces: &[String], mode: Option<AttachMode>) -> Result<()> {
    let settings = Settings::from_cli(ifaces.to_vec(), mode)?;
    util::lookup_interface(&settings.ifaces)?;

    for iface in settings.ifaces.iter() {
        let session = XdpSession::attach(iface, settings.mode)
            .with_context(|| format!("icmpmark cannot be mounted on {}", iface))?;
        println!("{}", format!("icmpmark can be mounted on {}", session.iface()).bright_green());
        session.detach();
    }

    Ok(())
}
