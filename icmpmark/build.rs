use anyhow::{anyhow, Context as _};
use aya_build::cargo_metadata;

fn main() -> anyhow::Result<()> {
    let cargo_metadata::Metadata { packages, .. } = cargo_metadata::MetadataCommand::new()
        .no_deps()
        .exec()
        .context("failed to fetch cargo metadata")?;

    let ebpf_package = packages
        .into_iter()
        .find(|pkg| pkg.name == "icmpmark-ebpf")
        .ok_or_else(|| anyhow!("icmpmark-ebpf package not found"))?;

    aya_build::build_ebpf([ebpf_package])
}
