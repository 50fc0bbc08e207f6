mod app;
mod breaks;
mod config;
mod diagnostics;
mod error;
mod peripherals;
mod reboot;
mod reveal;
mod session;
mod status;
#[cfg(test)]
mod testing;
mod tick;
mod time_provider;

use std::env;
use std::path::PathBuf;
use std::process::Command;

use anyhow::{Context, Result};
use clap::Parser;
use env_logger::Env;
use rand::SeedableRng;
use rand_pcg::Mcg128Xsl64;

use crate::app::LiveWatchApp;
use crate::config::model::{DeviceConfig, load_device_config, save_device_config};
use crate::peripherals::Peripherals;
use crate::peripherals::console::{ConsoleAudio, ConsoleDisplay, ConsoleLights, StdinButtons};
use crate::status::helix::HelixStatusClient;
use crate::time_provider::SystemTimeSource;

#[derive(Parser, Debug)]
#[command(
    name = "livewatch",
    version,
    about = "Live-status monitor with staged reveal and break reminders"
)]
struct Cli {
    #[arg(long, default_value = "livewatch.json")]
    config: PathBuf,

    #[arg(long)]
    diagnostics: bool,

    /// Write a config template to PATH and exit.
    #[arg(long, value_name = "PATH")]
    write_config: Option<PathBuf>,

    /// Seed for the reveal animation; random when omitted.
    #[arg(long)]
    seed: Option<u64>,
}

fn main() {
    env_logger::Builder::from_env(Env::default().default_filter_or("info")).init();
    if let Err(err) = run() {
        eprintln!("error: {err:#}");
        std::process::exit(1);
    }
}

fn run() -> Result<()> {
    let cli = Cli::parse();

    if let Some(path) = cli.write_config.as_deref() {
        save_device_config(path, &DeviceConfig::template())?;
        println!("Wrote config template to {}", path.display());
        return Ok(());
    }

    let config = load_device_config(&cli.config)
        .with_context(|| format!("failed to load {}", cli.config.display()))?;
    let clock = SystemTimeSource::new();

    if cli.diagnostics {
        return diagnostics::run_diagnostics(&config, &clock);
    }

    let status = HelixStatusClient::new(config.api.clone(), config.credentials.clone())
        .context("failed to build the status API client")?;
    let io = Peripherals {
        display: Box::new(ConsoleDisplay::default()),
        lights: Box::new(ConsoleLights::default()),
        audio: Box::new(ConsoleAudio::default()),
        input: Box::new(StdinButtons::spawn()),
        clock: Box::new(clock),
    };
    let rng = match cli.seed {
        Some(seed) => Mcg128Xsl64::seed_from_u64(seed),
        None => Mcg128Xsl64::from_entropy(),
    };

    let mut app = LiveWatchApp::new(config, Box::new(status), io, rng);
    let restart = app.run();
    log::warn!("restart requested: {}", restart.reason);
    drop(app);

    let exe = env::current_exe().context("unable to locate the running executable")?;
    let mut command = Command::new(exe);
    command.args(env::args_os().skip(1));
    restart_process(command)
}

#[cfg(unix)]
fn restart_process(mut command: Command) -> Result<()> {
    use std::os::unix::process::CommandExt;

    let err = command.exec();
    Err(anyhow::Error::new(err).context("failed to re-execute livewatch"))
}

#[cfg(not(unix))]
fn restart_process(mut command: Command) -> Result<()> {
    command
        .spawn()
        .context("failed to start a fresh livewatch process")?;
    std::process::exit(0)
}
