use anyhow::Result;
use clap::Parser;
use icmpmark::{
    app::{self, Application},
    cmd::{Cmd, SubCmd},
    config::Settings,
    metrics::Metrics,
    send,
};

#[tokio::main]
async fn main() -> Result<()> {
    let cmd = Cmd::parse();
    env_logger::Builder::new()
        .parse_filters(&cmd.verbose)
        .init();

    let settings = match &cmd.sub_cmd {
        SubCmd::Check => return app::check(&cmd.ifaces, cmd.mode),
        SubCmd::Send(echo) => return send::send(echo),
        SubCmd::Watch => Settings::from_cli(cmd.ifaces.clone(), cmd.mode)?,
        SubCmd::Run(run) => {
            let mut settings = Settings::load_config_path(&run.config)?;
            settings.merge_cli(&cmd.ifaces, cmd.mode)?;
            settings
        }
    };

    Application::new(settings, Metrics::new()?).run().await
}
