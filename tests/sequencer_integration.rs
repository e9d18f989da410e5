//! TuningSequencer end to end against scripted collaborators.
//!
//! Every fake appends to one shared log, so the tests can assert on the
//! exact order of radio, amplifier and console interactions.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use rf2k_trainer_lib::adapters::MockRadioLink;
use rf2k_trainer_lib::domain::{
    BandPlan, CapabilityFlags, Frequency, LinkCapabilities, TrainerError, TrainerResult,
};
use rf2k_trainer_lib::plan::TuningPlan;
use rf2k_trainer_lib::ports::{
    AmplifierMonitor, AmplifierReadings, FrequencyUnit, OperatorConsole, RadioLink,
    ReportedFrequency, SegmentRecord, TelemetrySink, TunerSetting, WaitPhase,
};
use rf2k_trainer_lib::ptt::{PttSettings, SessionMode};
use rf2k_trainer_lib::sequencer::{SequencerSettings, TuningSequencer, VerifySettings};

type Log = Arc<Mutex<Vec<String>>>;

fn entries(log: &Log, prefix: &str) -> usize {
    log.lock()
        .unwrap()
        .iter()
        .filter(|e| e.starts_with(prefix))
        .count()
}

// ---------------------------------------------------------------------------
// Fakes
// ---------------------------------------------------------------------------

/// Radio with edge waits. `keyed` decides whether the operator ever keys up.
struct FakeRadio {
    log: Log,
    caps: LinkCapabilities,
    keyed: bool,
    refuse_drive: bool,
}

impl FakeRadio {
    fn new(log: &Log, keyed: bool) -> Self {
        Self {
            log: Arc::clone(log),
            caps: LinkCapabilities::new(true),
            keyed,
            refuse_drive: false,
        }
    }

    fn push(&self, entry: String) {
        self.log.lock().unwrap().push(entry);
    }
}

impl RadioLink for FakeRadio {
    fn connect(&mut self) -> TrainerResult<()> {
        Ok(())
    }
    fn set_mode(&mut self, mode: &str, bw: u32) -> TrainerResult<()> {
        self.push(format!("radio: mode {mode} {bw}"));
        Ok(())
    }
    fn set_frequency(&mut self, freq: Frequency) -> TrainerResult<()> {
        self.push(format!("radio: tune {}", freq.as_hz()));
        Ok(())
    }
    fn set_drive_power(&mut self, watts: u32) -> TrainerResult<()> {
        self.push(format!("radio: drive {watts}"));
        if self.refuse_drive {
            return Err(TrainerError::Rejected {
                command: "drive".into(),
                code: "50000015".into(),
            });
        }
        Ok(())
    }
    fn get_ptt(&mut self) -> TrainerResult<bool> {
        self.push("radio: get_ptt".into());
        Ok(false)
    }
    fn wait_for_tx(&mut self, timeout: Duration) -> bool {
        self.push("radio: wait_for_tx".into());
        if !self.keyed {
            std::thread::sleep(timeout);
        }
        self.keyed
    }
    fn wait_for_unkey(&mut self, _timeout: Duration) -> bool {
        self.push("radio: wait_for_unkey".into());
        true
    }
    fn capabilities(&self) -> CapabilityFlags {
        self.caps.snapshot()
    }
    fn disable_ptt_sensing(&mut self) {
        self.push("radio: sensing disabled".into());
        self.caps.mark_ptt_unreadable();
    }
    fn description(&self) -> &str {
        "fake radio"
    }
    fn disconnect(&mut self) {}
    fn shutdown(&mut self, restore: bool) {
        self.push(format!("radio: shutdown restore={restore}"));
    }
}

/// Amplifier that reports a fixed kHz, or follows the radio when `None`.
struct FakeAmp {
    log: Log,
    fixed_khz: Option<f64>,
    follows: Arc<Mutex<Option<Frequency>>>,
}

impl AmplifierMonitor for FakeAmp {
    fn reported_frequency(&mut self) -> TrainerResult<ReportedFrequency> {
        self.log.lock().unwrap().push("amp: /data".into());
        let khz = match self.fixed_khz {
            Some(khz) => khz,
            None => self
                .follows
                .lock()
                .unwrap()
                .map(|f| f.as_khz())
                .unwrap_or(0.0),
        };
        Ok(ReportedFrequency::new(khz, FrequencyUnit::KHz))
    }
    fn readings(&mut self) -> TrainerResult<AmplifierReadings> {
        self.log.lock().unwrap().push("amp: /power".into());
        Ok(AmplifierReadings {
            forward_watts: 500.0,
            swr: 1.1,
        })
    }
    fn tuner_setting(&mut self) -> TrainerResult<TunerSetting> {
        self.log.lock().unwrap().push("amp: /tuner".into());
        Ok(TunerSetting {
            tuned_khz: 7012.0,
            segment_khz: 25.0,
            mode: "AUTO".into(),
            setup: "ANT1".into(),
            inductance_nh: Some(1250.0),
            capacitance_pf: Some(330.0),
        })
    }
}

struct FakeConsole {
    log: Log,
}

impl OperatorConsole for FakeConsole {
    fn say(&mut self, _message: &str) {}
    fn confirm(&mut self, prompt: &str) -> TrainerResult<()> {
        self.log.lock().unwrap().push(format!("console: confirm {prompt}"));
        Ok(())
    }
    fn waiting(&mut self, _phase: WaitPhase, _elapsed_secs: f64) {}
    fn wait_finished(&mut self, _phase: WaitPhase, _observed: bool) {}
    fn beep(&mut self) {
        self.log.lock().unwrap().push("console: beep".into());
    }
}

struct Recorder(Arc<Mutex<Vec<SegmentRecord>>>);

impl TelemetrySink for Recorder {
    fn record_segment(&mut self, record: &SegmentRecord) -> TrainerResult<()> {
        self.0.lock().unwrap().push(record.clone());
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn band(label: &str, start_khz: f64, end_khz: f64, seg_khz: f64, ref_khz: f64) -> BandPlan {
    BandPlan::new(
        label.to_string(),
        Frequency::khz(start_khz),
        Frequency::khz(end_khz),
        Frequency::khz(seg_khz).as_hz(),
        Frequency::khz(ref_khz),
    )
    .unwrap()
}

fn two_band_plan() -> TuningPlan {
    TuningPlan::build(vec![
        band("60m", 5351.5, 5366.5, 9.0, 5359.0).with_drive_power(15),
        band("40m", 7000.0, 7050.0, 25.0, 7012.5),
    ])
    .unwrap()
}

fn settings(verify: Option<VerifySettings>) -> SequencerSettings {
    SequencerSettings {
        auto_set_mode: true,
        mode: "CW".into(),
        bandwidth_hz: 400,
        default_drive_watts: 13,
        verify,
        cat_settle: Duration::ZERO,
        use_beep: true,
    }
}

fn quick_ptt() -> PttSettings {
    PttSettings {
        force_manual: false,
        simulation: false,
        adaptive_fallback_after: Duration::from_millis(60),
        wait_tx_timeout: Duration::from_secs(1),
        wait_unkey_timeout: Duration::from_secs(1),
        wait_step: Duration::from_millis(20),
        poll_interval: Duration::from_millis(10),
    }
}

fn quick_verify() -> Option<VerifySettings> {
    Some(VerifySettings {
        max_attempts: 2,
        delay: Duration::from_millis(1),
    })
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

/// Amplifier stuck on the wrong frequency: the run stops before any PTT
/// acquisition, after exactly the configured number of reads.
#[test]
fn frequency_mismatch_aborts_before_keying() {
    let log: Log = Arc::new(Mutex::new(Vec::new()));
    let amp = FakeAmp {
        log: Arc::clone(&log),
        fixed_khz: Some(14_070.0),
        follows: Arc::new(Mutex::new(None)),
    };
    let records = Arc::new(Mutex::new(Vec::new()));
    let mut seq = TuningSequencer::new(
        Box::new(FakeRadio::new(&log, true)),
        Some(Box::new(amp)),
        Box::new(Recorder(Arc::clone(&records))),
        Box::new(FakeConsole {
            log: Arc::clone(&log),
        }),
        settings(quick_verify()),
        quick_ptt(),
    )
    .unwrap();
    // Startup reads PTT once to learn whether it can
    assert_eq!(entries(&log, "radio: get_ptt"), 1);

    let err = seq.run(&two_band_plan()).unwrap_err();
    assert!(matches!(err, TrainerError::Safety(_)));
    assert!(err.is_fatal());

    assert_eq!(entries(&log, "amp: /data"), 2);
    assert_eq!(entries(&log, "radio: wait_for"), 0, "no PTT acquisition");
    assert_eq!(entries(&log, "radio: get_ptt"), 1, "none during the run");
    assert_eq!(entries(&log, "console: confirm"), 0);
    assert_eq!(entries(&log, "console: beep"), 0, "no carrier cue either");
    assert!(records.lock().unwrap().is_empty());

    seq.into_link().shutdown(true);
    assert_eq!(entries(&log, "radio: shutdown restore=true"), 1);
}

/// Nobody keys up inside the fallback window: the session latches to
/// manual, finishes the same segment with prompts, and stays manual.
#[test]
fn silent_operator_falls_back_to_manual_for_good() {
    let log: Log = Arc::new(Mutex::new(Vec::new()));
    let records = Arc::new(Mutex::new(Vec::new()));
    let plan = TuningPlan::build(vec![band("40m", 7000.0, 7050.0, 25.0, 7012.5)]).unwrap();
    let mut seq = TuningSequencer::new(
        Box::new(FakeRadio::new(&log, false)),
        None,
        Box::new(Recorder(Arc::clone(&records))),
        Box::new(FakeConsole {
            log: Arc::clone(&log),
        }),
        settings(None),
        quick_ptt(),
    )
    .unwrap();
    assert_eq!(seq.ptt().mode(), SessionMode::EventDriven);

    let summary = seq.run(&plan).unwrap();

    assert_eq!(seq.ptt().mode(), SessionMode::Manual);
    assert_eq!(entries(&log, "radio: sensing disabled"), 1);
    assert_eq!(summary.segments_tuned, plan.len());
    assert_eq!(summary.segments_skipped, 0);
    assert_eq!(entries(&log, "console: confirm"), 2 * plan.len());
    assert!(!seq.link_mut().capabilities().ptt_readable);

    let records = records.lock().unwrap();
    assert_eq!(records.len(), plan.len());
    assert!(records
        .iter()
        .all(|r| !r.used_automatic_sensing && r.readings.is_none()));
}

/// Happy path: amplifier follows, operator keys and unkeys, readings are
/// recorded, and each band gets its own mode and drive setup.
#[test]
fn automatic_run_records_readings_per_segment() {
    let log: Log = Arc::new(Mutex::new(Vec::new()));
    let follows = Arc::new(Mutex::new(None));

    // The amplifier follows the radio over "CAT": mirror the last tune
    struct FollowingRadio {
        inner: FakeRadio,
        follows: Arc<Mutex<Option<Frequency>>>,
    }
    impl RadioLink for FollowingRadio {
        fn connect(&mut self) -> TrainerResult<()> {
            self.inner.connect()
        }
        fn set_mode(&mut self, mode: &str, bw: u32) -> TrainerResult<()> {
            self.inner.set_mode(mode, bw)
        }
        fn set_frequency(&mut self, freq: Frequency) -> TrainerResult<()> {
            *self.follows.lock().unwrap() = Some(freq);
            self.inner.set_frequency(freq)
        }
        fn set_drive_power(&mut self, watts: u32) -> TrainerResult<()> {
            self.inner.set_drive_power(watts)
        }
        fn get_ptt(&mut self) -> TrainerResult<bool> {
            self.inner.get_ptt()
        }
        fn wait_for_tx(&mut self, timeout: Duration) -> bool {
            self.inner.wait_for_tx(timeout)
        }
        fn wait_for_unkey(&mut self, timeout: Duration) -> bool {
            self.inner.wait_for_unkey(timeout)
        }
        fn capabilities(&self) -> CapabilityFlags {
            self.inner.capabilities()
        }
        fn disable_ptt_sensing(&mut self) {
            self.inner.disable_ptt_sensing()
        }
        fn description(&self) -> &str {
            self.inner.description()
        }
        fn disconnect(&mut self) {}
        fn shutdown(&mut self, restore: bool) {
            self.inner.shutdown(restore)
        }
    }

    let radio = FollowingRadio {
        inner: FakeRadio::new(&log, true),
        follows: Arc::clone(&follows),
    };
    let amp = FakeAmp {
        log: Arc::clone(&log),
        fixed_khz: None,
        follows,
    };
    let records = Arc::new(Mutex::new(Vec::new()));
    let plan = two_band_plan();
    let mut seq = TuningSequencer::new(
        Box::new(radio),
        Some(Box::new(amp)),
        Box::new(Recorder(Arc::clone(&records))),
        Box::new(FakeConsole {
            log: Arc::clone(&log),
        }),
        settings(quick_verify()),
        quick_ptt(),
    )
    .unwrap();

    let summary = seq.run(&plan).unwrap();
    assert_eq!(summary.bands, ["60m", "40m"]);
    assert_eq!(summary.segments_tuned, plan.len());
    assert_eq!(entries(&log, "amp: /data"), plan.len(), "first read matches");
    assert_eq!(entries(&log, "console: confirm"), 0);
    assert_eq!(entries(&log, "console: beep"), plan.len());

    // Band setup happens once per band, with the per-band drive override
    assert_eq!(entries(&log, "radio: mode CW 400"), 2);
    assert_eq!(entries(&log, "radio: drive 15"), 1);
    assert_eq!(entries(&log, "radio: drive 13"), 1);

    assert_eq!(entries(&log, "amp: /tuner"), plan.len(), "L/C read after every segment");

    let records = records.lock().unwrap();
    assert!(records.iter().all(|r| r.used_automatic_sensing));
    assert!(records.iter().all(|r| r.readings.is_some()));
    assert!(records.iter().all(|r| r.tuner.is_some()));
    assert_eq!(records[0].band, "60m");
    assert_eq!(records.last().unwrap().band, "40m");
}

/// A band whose setup fails is skipped; the rest of the run continues.
#[test]
fn band_setup_failure_skips_only_that_point() {
    let log: Log = Arc::new(Mutex::new(Vec::new()));
    let mut radio = FakeRadio::new(&log, true);
    radio.refuse_drive = true;
    let plan = two_band_plan();
    let mut seq = TuningSequencer::new(
        Box::new(radio),
        None,
        Box::new(Recorder(Arc::new(Mutex::new(Vec::new())))),
        Box::new(FakeConsole {
            log: Arc::clone(&log),
        }),
        settings(None),
        quick_ptt(),
    )
    .unwrap();

    let summary = seq.run(&plan).unwrap();
    assert_eq!(summary.segments_skipped, 2, "first point of each band");
    assert_eq!(summary.segments_tuned, plan.len() - 2);
}

/// The mock radio can't sense PTT, so a dry run is manual from the start.
#[test]
fn mock_radio_runs_manually() {
    let log: Log = Arc::new(Mutex::new(Vec::new()));
    let mut radio = MockRadioLink::new();
    radio.connect().unwrap();
    let commands = radio.command_log();
    let plan = TuningPlan::build(vec![band("40m", 7000.0, 7050.0, 25.0, 7012.5)]).unwrap();
    let mut seq = TuningSequencer::new(
        Box::new(radio),
        None,
        Box::new(Recorder(Arc::new(Mutex::new(Vec::new())))),
        Box::new(FakeConsole {
            log: Arc::clone(&log),
        }),
        settings(None),
        quick_ptt(),
    )
    .unwrap();
    assert_eq!(seq.ptt().mode(), SessionMode::Manual);

    let summary = seq.run(&plan).unwrap();
    assert_eq!(summary.segments_tuned, plan.len());
    assert_eq!(entries(&log, "console: confirm"), 2 * plan.len());

    let commands = commands.lock().unwrap();
    assert!(commands.contains(&"SET MODE CW 400".to_string()));
    assert!(commands.contains(&"SET POWER 13".to_string()));
}

/// The operator's terminal goes away mid-run: the first failed prompt ends
/// the run instead of skipping every remaining segment.
#[test]
fn closed_console_aborts_the_run() {
    struct ClosedConsole {
        confirms: Arc<Mutex<usize>>,
    }
    impl OperatorConsole for ClosedConsole {
        fn say(&mut self, _message: &str) {}
        fn confirm(&mut self, _prompt: &str) -> TrainerResult<()> {
            *self.confirms.lock().unwrap() += 1;
            Err(TrainerError::Console("stdin closed".into()))
        }
        fn waiting(&mut self, _phase: WaitPhase, _elapsed_secs: f64) {}
        fn wait_finished(&mut self, _phase: WaitPhase, _observed: bool) {}
    }

    let confirms = Arc::new(Mutex::new(0));
    let records = Arc::new(Mutex::new(Vec::new()));
    let mut radio = MockRadioLink::new();
    radio.connect().unwrap();
    let mut seq = TuningSequencer::new(
        Box::new(radio),
        None,
        Box::new(Recorder(Arc::clone(&records))),
        Box::new(ClosedConsole {
            confirms: Arc::clone(&confirms),
        }),
        settings(None),
        quick_ptt(),
    )
    .unwrap();

    let err = seq.run(&two_band_plan()).unwrap_err();
    assert!(matches!(err, TrainerError::Console(_)));
    assert!(err.is_abort());
    assert!(!err.is_fatal());
    assert_eq!(*confirms.lock().unwrap(), 1);
    assert!(records.lock().unwrap().is_empty());
}

/// Frequency verification without an amplifier to read is a setup error.
#[test]
fn verification_without_amplifier_is_rejected() {
    let log: Log = Arc::new(Mutex::new(Vec::new()));
    let result = TuningSequencer::new(
        Box::new(FakeRadio::new(&log, true)),
        None,
        Box::new(Recorder(Arc::new(Mutex::new(Vec::new())))),
        Box::new(FakeConsole {
            log: Arc::clone(&log),
        }),
        settings(quick_verify()),
        quick_ptt(),
    );
    assert!(matches!(result, Err(TrainerError::Config(_))));
}
