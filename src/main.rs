// rf2k-trainer -- walks the RF2K-S segment grid band by band so the
// operator can tune and store a match on every segment.
//
// Usage:
//   rf2k-trainer                      # every enabled band in the config
//   rf2k-trainer 40 60m               # only these bands, in this order
//   rf2k-trainer --info 20m           # print the segment plan and exit
//   rf2k-trainer --config shack.json --debug

use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;

use rf2k_trainer_lib::adapters::{
    open_radio_link, LogTelemetry, OperateMode, Rf2ksClient, TerminalConsole,
};
use rf2k_trainer_lib::domain::{TrainerConfig, TrainerError, TrainerResult};
use rf2k_trainer_lib::plan::{describe_band, TuningPlan};
use rf2k_trainer_lib::ports::{AmplifierMonitor, RadioLink};
use rf2k_trainer_lib::ptt::PttSettings;
use rf2k_trainer_lib::sequencer::{show_instructions, SequencerSettings, TuningSequencer};

/// Segment-by-segment tuning sequencer for the RF2K-S HF power amplifier.
#[derive(Parser)]
#[command(name = "rf2k-trainer", version, about)]
struct Cli {
    /// Bands to tune, e.g. `40m` or `40`. Defaults to every enabled band.
    bands: Vec<String>,

    /// JSON settings file.
    #[arg(long, short, default_value = "settings.json")]
    config: PathBuf,

    /// Verbose logging.
    #[arg(long)]
    debug: bool,

    /// Print the segment plan for the selected bands and exit.
    #[arg(long)]
    info: bool,
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    let level = if cli.debug { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level))
        .format_timestamp_millis()
        .init();

    match run(&cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("[ERROR] {e}");
            ExitCode::FAILURE
        }
    }
}

fn run(cli: &Cli) -> TrainerResult<()> {
    let config = TrainerConfig::load(&cli.config)?;
    let plan = TuningPlan::build(config.band_plans(&cli.bands)?)?;

    if cli.info {
        for band in plan.bands() {
            println!("{}", describe_band(band)?);
        }
        return Ok(());
    }

    let amplifier = open_amplifier(&config)?;

    let mut link = open_radio_link(&config.radio);
    link.connect()?;
    log::info!("[RADIO] {}", link.description());

    let mut console = TerminalConsole::stdio();
    if let Err(e) = show_instructions(&mut console, &config, &plan) {
        abort(link.as_mut(), &e);
        return Err(e);
    }

    let mut sequencer = TuningSequencer::new(
        link,
        amplifier,
        Box::new(LogTelemetry::new()),
        Box::new(console),
        SequencerSettings::from_config(&config),
        PttSettings::from_config(&config.defaults, &config.radio),
    )?;
    log::info!(
        "[PTT] session mode: {} ({} segments)",
        sequencer.ptt().mode(),
        plan.len()
    );

    let outcome = sequencer.run(&plan);
    let mut link = sequencer.into_link();

    match outcome {
        Ok(summary) => {
            link.shutdown(true);
            println!("\n{summary}");
            Ok(())
        }
        Err(e) => {
            abort(link.as_mut(), &e);
            Err(e)
        }
    }
}

fn open_amplifier(config: &TrainerConfig) -> TrainerResult<Option<Box<dyn AmplifierMonitor>>> {
    if !config.amplifier.enabled {
        return Ok(None);
    }
    let client = Rf2ksClient::new(&config.amplifier)?;
    if let Err(e) = client.fetch_info() {
        log::warn!("[RF2K-S] {} not answering: {e}", client.base_url());
    }
    // Tuning drives the tuner only; never the PA
    client.set_operate_mode(OperateMode::Standby)?;
    let monitor: Box<dyn AmplifierMonitor> = Box::new(client);
    Ok(Some(monitor))
}

/// Put the radio back the way it was found, then explain why we stopped.
fn abort(link: &mut dyn RadioLink, cause: &TrainerError) {
    eprintln!("\n!!! Tuning aborted: {cause}");
    if matches!(cause, TrainerError::Safety(_)) {
        eprintln!("!!! The amplifier did not follow the radio's frequency. Do NOT key a carrier.");
    }
    link.shutdown(true);
    eprintln!("[RESTORE] Radio restore attempted; see the log for what was put back.");
}
