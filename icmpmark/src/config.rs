use std::{fs::File, io, net::SocketAddr, path::Path, time::Duration};

use anyhow::{anyhow, Context, Result};
use serde::Deserialize;

use crate::cmd::AttachMode;

#[derive(Debug, Deserialize)]
pub struct Settings {
    #[serde(default)]
    pub ifaces: Vec<String>,

    #[serde(default)]
    pub mode: AttachMode,

    /// Pages per CPU for the perf ring, must be a power of two.
    #[serde(rename(deserialize = "perfPages"), default = "default_perf_pages")]
    pub perf_pages: usize,

    #[serde(
        rename(deserialize = "channelCapacity"),
        default = "default_channel_capacity"
    )]
    pub channel_capacity: usize,

    #[serde(
        rename(deserialize = "reportInterval"),
        default = "default_report_interval"
    )]
    pub report_interval: String,

    pub metrics: Option<MetricsConfig>,
}

#[derive(Debug, Deserialize)]
pub struct MetricsConfig {
    #[serde(default = "default_listen")]
    pub listen: String,

    #[serde(default = "default_metrics_path")]
    pub path: String,
}

impl Settings {
    /// Settings for the CLI-only subcommands: no metrics endpoint.
    pub fn from_cli(ifaces: Vec<String>, mode: Option<AttachMode>) -> Result<Self> {
        let mut settings = Self {
            ifaces,
            mode: mode.unwrap_or_default(),
            perf_pages: default_perf_pages(),
            channel_capacity: default_channel_capacity(),
            report_interval: default_report_interval(),
            metrics: None,
        };
        settings.check()?;

        Ok(settings)
    }

    /// Reads the file without validating it: flags given on the command line
    /// still have to be merged in, see [`Settings::merge_cli`].
    pub fn load_config_path<P>(path: P) -> Result<Self>
    where
        P: AsRef<Path>,
    {
        let file = File::options()
            .read(true)
            .open(path.as_ref())
            .with_context(|| format!("failed to open config '{}'", path.as_ref().display()))?;
        Self::parse(file)
            .with_context(|| format!("failed to parse config '{}'", path.as_ref().display()))
    }

    pub fn load_config<R>(reader: R) -> Result<Self>
    where
        R: io::Read,
    {
        let mut settings = Self::parse(reader)?;
        settings.check()?;

        Ok(settings)
    }

    fn parse<R>(reader: R) -> Result<Self>
    where
        R: io::Read,
    {
        Ok(serde_yaml::from_reader(reader)?)
    }

    /// Flags given on the command line win over the file.
    pub fn merge_cli(&mut self, ifaces: &[String], mode: Option<AttachMode>) -> Result<()> {
        if !ifaces.is_empty() {
            self.ifaces = ifaces.to_vec();
        }
        if let Some(mode) = mode {
            self.mode = mode;
        }

        self.check()
    }

    pub fn check(&mut self) -> Result<()> {
        if self.ifaces.is_empty() {
            return Err(anyhow!("at least one iface is required"));
        }
        self.ifaces.sort();
        self.ifaces.dedup();

        if self.perf_pages == 0 || !self.perf_pages.is_power_of_two() {
            return Err(anyhow!(
                "perfPages='{}' must be a non-zero power of two",
                self.perf_pages
            ));
        }

        if self.channel_capacity == 0 {
            return Err(anyhow!("channelCapacity must be greater than zero"));
        }

        self.report_interval()?;

        if let Some(metrics) = self.metrics.as_ref() {
            metrics.listen_addr()?;
            if !metrics.path.starts_with('/') {
                return Err(anyhow!(
                    "metrics path '{}' must start with '/'",
                    metrics.path
                ));
            }
            // axum refuses to route segments in its old capture syntax
            if metrics
                .path
                .split('/')
                .any(|segment| segment.starts_with(':') || segment.starts_with('*'))
            {
                return Err(anyhow!(
                    "metrics path '{}' must not contain segments starting with ':' or '*'",
                    metrics.path
                ));
            }
        }

        Ok(())
    }

    pub fn report_interval(&self) -> Result<Duration> {
        let interval = humantime::parse_duration(&self.report_interval).with_context(|| {
            format!("failed to parse reportInterval='{}'", self.report_interval)
        })?;
        if interval.is_zero() {
            return Err(anyhow!("reportInterval must be greater than zero"));
        }

        Ok(interval)
    }
}

impl MetricsConfig {
    pub fn listen_addr(&self) -> Result<SocketAddr> {
        self.listen
            .parse()
            .with_context(|| format!("failed to parse metrics listen='{}'", self.listen))
    }
}

fn default_perf_pages() -> usize {
    64
}

fn default_channel_capacity() -> usize {
    4096
}

// By default, a summary is logged every 30 seconds.
fn default_report_interval() -> String {
    String::from("30s")
}

fn default_listen() -> String {
    String::from("0.0.0.0:9100")
}

fn default_metrics_path() -> String {
    String::from("/metrics")
}
