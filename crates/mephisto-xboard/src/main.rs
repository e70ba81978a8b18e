// CECP (Xboard) adapter for emulated Mephisto chess computers

use anyhow::{Context, Result};
use clap::Parser;
use mephisto_xboard::config::BridgeConfig;
use mephisto_xboard::input::{channel, spawn_stdin_reader};
use mephisto_xboard::runner::Runner;
use mephisto_xboard::transcript::Transcript;
use mephisto_xboard::xboard::GuiWriter;
use mephisto_xboard::{Bridge, LoopbackDevice};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Device model (mm50, mm5, mm4, rebel5, glasgow, dallas, amsterd,
    /// dallas16, dallas32, roma32)
    #[arg(long, default_value = "mm50")]
    driver: String,

    /// Run the device as fast as the host allows (default)
    #[arg(long, conflicts_with = "no_unlimited")]
    unlimited: bool,

    /// Run the device at its original speed with its own levels
    #[arg(long)]
    no_unlimited: bool,

    /// Move entry overhead in milliseconds; skips the speed calibration
    #[arg(long)]
    tc_delay: Option<u32>,

    /// Device CPU clock in Hz
    #[arg(long)]
    clock: Option<u32>,

    /// Write the exchange transcript log_<driver>.txt
    #[arg(long)]
    log: bool,

    /// Directory of the transcript
    #[arg(long, default_value = ".")]
    log_dir: PathBuf,

    /// Position file read on the load trigger
    #[arg(long, default_value = mephisto_xboard::config::DEFAULT_FEN_FILE)]
    fen_file: PathBuf,

    /// TOML file with profile overrides
    #[arg(long)]
    config: Option<PathBuf>,

    /// Enable debug logging
    #[arg(short, long)]
    debug: bool,
}

fn main() {
    let args = Args::parse();

    use std::io::Write;
    let log_level = if args.debug { "debug" } else { "info" };
    let mut builder = env_logger::Builder::from_env(
        env_logger::Env::default().filter_or(env_logger::DEFAULT_FILTER_ENV, log_level),
    );
    builder
        .format(|buf, record| {
            writeln!(buf, "[{}] {}: {}", record.level(), record.target(), record.args())
        })
        .write_style(env_logger::WriteStyle::Never)
        .target(env_logger::Target::Stderr)
        .init();

    // Nothing but protocol lines may reach stdout.
    if let Err(e) = run(args) {
        log::error!("Fatal error: {e:#}");
        std::process::exit(1);
    }
}

fn run(args: Args) -> Result<()> {
    let unlimited = !args.no_unlimited;
    let mut config = BridgeConfig::for_driver(&args.driver, unlimited, args.config.as_deref())
        .context("Failed to build the device profile")?
        .with_fen_file(&args.fen_file);
    if let Some(hz) = args.clock {
        config = config.with_clock(hz);
    }
    if let Some(ms) = args.tc_delay {
        config = config.with_tc_delay(ms);
    }

    let mut writer = GuiWriter::stdout();
    if args.log {
        let mut transcript = Transcript::open(&args.log_dir, config.profile.driver)
            .with_context(|| format!("Failed to open transcript in {}", args.log_dir.display()))?;
        transcript.note(&format!("Session start: {}", config.profile.name));
        writer = writer.with_transcript(transcript);
    }

    let (feeder, input) = channel();
    let _stdin_handle = spawn_stdin_reader(feeder);

    let device = LoopbackDevice::for_profile(&config.profile);
    let mut runner = Runner::for_config(&config);
    let mut bridge = Bridge::new(config, device, input, writer);
    runner.run(&mut bridge).context("Bridge loop failed")?;

    log::info!("Shutting down after {} frames", runner.frames());
    Ok(())
}
