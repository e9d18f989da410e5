//! Run configuration
//!
//! A `TrainerConfig` is the JSON file the operator maintains: which radio
//! backend to talk to, whether the amplifier is under programmatic control,
//! session defaults, and the bands to walk. Band limits are written in kHz
//! and converted to integer Hz exactly once, in `band_plans()`.

use std::path::Path;

use serde::{Deserialize, Serialize};

use super::{BandPlan, Frequency, TrainerError, TrainerResult};

/// Lowest drive the RF2K-S tuner accepts
pub const MIN_DRIVE_WATTS: u32 = 4;
/// Highest drive the RF2K-S tuner accepts; more risks damaging the amplifier
pub const MAX_DRIVE_WATTS: u32 = 39;
/// Below this the tuner still works but the match is less accurate
pub const RECOMMENDED_MIN_DRIVE_WATTS: u32 = 10;

/// Upper bound for any band edge (kHz)
const MAX_BAND_EDGE_KHZ: f64 = 60_000.0;

/// Which radio backend to drive
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RadioType {
    /// SmartSDR TCP API (event-driven)
    Flex,
    /// Hamlib rigctld network protocol (request/response)
    Rigctl,
    /// In-memory radio for dry runs
    Mock,
}

impl RadioType {
    pub fn default_port(&self) -> u16 {
        match self {
            RadioType::Flex => 4992,
            RadioType::Rigctl => 4532,
            RadioType::Mock => 0,
        }
    }
}

fn default_host() -> String {
    "localhost".to_string()
}

fn default_true() -> bool {
    true
}

fn default_ack_timeout_ms() -> u64 {
    5_000
}

fn default_connect_timeout_ms() -> u64 {
    5_000
}

/// Radio connection settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RadioSettings {
    #[serde(rename = "type")]
    pub radio_type: RadioType,
    #[serde(default = "default_host")]
    pub host: String,
    /// Falls back to the backend's well-known port when absent
    #[serde(default)]
    pub port: Option<u16>,
    /// Free-text model name; `"dummy"` marks a simulation target
    #[serde(default)]
    pub model: Option<String>,
    /// Hamlib model number the external rigctld was started with (1 = Dummy)
    #[serde(default)]
    pub rigctld_model: Option<u32>,
    /// Run a background PTT sampler on polling links
    #[serde(default = "default_true")]
    pub ptt_poller: bool,
    #[serde(default = "default_ack_timeout_ms")]
    pub ack_timeout_ms: u64,
    #[serde(default = "default_connect_timeout_ms")]
    pub connect_timeout_ms: u64,
}

impl Default for RadioSettings {
    fn default() -> Self {
        Self {
            radio_type: RadioType::Rigctl,
            host: default_host(),
            port: None,
            model: None,
            rigctld_model: None,
            ptt_poller: true,
            ack_timeout_ms: default_ack_timeout_ms(),
            connect_timeout_ms: default_connect_timeout_ms(),
        }
    }
}

impl RadioSettings {
    pub fn port(&self) -> u16 {
        self.port.unwrap_or_else(|| self.radio_type.default_port())
    }

    /// A backend with no RF path, where automatic PTT sensing is meaningless.
    pub fn is_simulation(&self) -> bool {
        self.radio_type == RadioType::Mock
            || self.rigctld_model == Some(1)
            || self
                .model
                .as_deref()
                .is_some_and(|m| m.eq_ignore_ascii_case("dummy"))
    }
}

fn default_amp_port() -> u16 {
    8080
}

fn default_verify_attempts() -> u32 {
    2
}

fn default_verify_delay_ms() -> u64 {
    2_000
}

fn default_cat_settle_ms() -> u64 {
    300
}

/// How the RF2K-S learns which frequency the radio is on
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AmplifierInterface {
    /// Follows the radio's CAT port
    #[default]
    Cat,
    /// Frequency counter on the RF input
    Universal,
    Udp,
    Tci,
}

/// RF2K-S amplifier REST settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AmplifierSettings {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default)]
    pub host: Option<String>,
    #[serde(default = "default_amp_port")]
    pub port: u16,
    /// Operational interface selected on the amplifier
    #[serde(default)]
    pub interface: AmplifierInterface,
    /// Check that the amplifier sees the radio's frequency before each segment
    #[serde(default = "default_true")]
    pub verify_frequency: bool,
    #[serde(default = "default_verify_attempts")]
    pub verify_max_attempts: u32,
    #[serde(default = "default_verify_delay_ms")]
    pub verify_delay_ms: u64,
    /// Pause after retuning so the amplifier's CAT follower catches up
    #[serde(default = "default_cat_settle_ms")]
    pub cat_settle_ms: u64,
}

impl Default for AmplifierSettings {
    fn default() -> Self {
        Self {
            enabled: false,
            host: None,
            port: default_amp_port(),
            interface: AmplifierInterface::Cat,
            verify_frequency: true,
            verify_max_attempts: default_verify_attempts(),
            verify_delay_ms: default_verify_delay_ms(),
            cat_settle_ms: default_cat_settle_ms(),
        }
    }
}

impl AmplifierSettings {
    pub fn base_url(&self) -> Option<String> {
        self.host
            .as_ref()
            .map(|host| format!("http://{host}:{}", self.port))
    }

    /// Only a CAT follower reports back the frequency we set, so only
    /// then can the pre-transmit check mean anything.
    pub fn can_verify_frequency(&self) -> bool {
        self.enabled && self.verify_frequency && self.interface == AmplifierInterface::Cat
    }
}

fn default_drive_power() -> u32 {
    13
}

fn default_mode() -> String {
    "CW".to_string()
}

fn default_bandwidth_hz() -> u32 {
    400
}

fn default_fallback_after_s() -> f64 {
    30.0
}

fn default_wait_tx_timeout_s() -> f64 {
    180.0
}

fn default_wait_unkey_timeout_s() -> f64 {
    300.0
}

fn default_step_s() -> f64 {
    0.25
}

/// Session-wide defaults
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionDefaults {
    #[serde(default = "default_drive_power")]
    pub drive_power: u32,
    #[serde(default = "default_true")]
    pub auto_set_cw_mode: bool,
    #[serde(default = "default_mode")]
    pub mode: String,
    #[serde(default = "default_bandwidth_hz")]
    pub bandwidth_hz: u32,
    #[serde(default)]
    pub force_manual_ptt: bool,
    /// Give up on automatic PTT sensing after this long without a TX edge
    #[serde(default = "default_fallback_after_s")]
    pub ptt_adaptive_fallback_after_s: f64,
    #[serde(default = "default_wait_tx_timeout_s")]
    pub wait_tx_timeout_s: f64,
    #[serde(default = "default_wait_unkey_timeout_s")]
    pub wait_unkey_timeout_s: f64,
    #[serde(default = "default_step_s")]
    pub wait_step_s: f64,
    #[serde(default = "default_step_s")]
    pub poll_interval_s: f64,
    #[serde(default = "default_true")]
    pub use_beep: bool,
}

impl Default for SessionDefaults {
    fn default() -> Self {
        Self {
            drive_power: default_drive_power(),
            auto_set_cw_mode: true,
            mode: default_mode(),
            bandwidth_hz: default_bandwidth_hz(),
            force_manual_ptt: false,
            ptt_adaptive_fallback_after_s: default_fallback_after_s(),
            wait_tx_timeout_s: default_wait_tx_timeout_s(),
            wait_unkey_timeout_s: default_wait_unkey_timeout_s(),
            wait_step_s: default_step_s(),
            poll_interval_s: default_step_s(),
            use_beep: true,
        }
    }
}

/// One band as written in the config file (kHz)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BandConfig {
    pub label: String,
    pub band_start_khz: f64,
    pub band_end_khz: f64,
    pub segment_size_khz: f64,
    /// Any segment center on the amplifier's grid for this band
    pub reference_center_khz: f64,
    #[serde(default)]
    pub drive_power: Option<u32>,
    #[serde(default = "default_true")]
    pub enabled: bool,
}

/// Complete run configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrainerConfig {
    pub radio: RadioSettings,
    #[serde(default)]
    pub amplifier: AmplifierSettings,
    #[serde(default)]
    pub defaults: SessionDefaults,
    #[serde(default)]
    pub bands: Vec<BandConfig>,
}

impl TrainerConfig {
    /// Read, parse and validate a JSON config file.
    pub fn load(path: impl AsRef<Path>) -> TrainerResult<Self> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path).map_err(|e| {
            TrainerError::Config(format!("Failed to read {}: {e}", path.display()))
        })?;
        let config: TrainerConfig = serde_json::from_str(&json).map_err(|e| {
            TrainerError::Config(format!("Failed to parse {}: {e}", path.display()))
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Reject anything that would make the run unsafe or meaningless.
    pub fn validate(&self) -> TrainerResult<()> {
        if self.radio.radio_type != RadioType::Mock && self.radio.host.trim().is_empty() {
            return Err(TrainerError::Config("radio.host must not be empty".into()));
        }
        if self.amplifier.enabled && self.amplifier.host.is_none() {
            return Err(TrainerError::Config(
                "amplifier.host is required when the amplifier is enabled".into(),
            ));
        }
        if self.amplifier.verify_max_attempts == 0 {
            return Err(TrainerError::Config(
                "amplifier.verify_max_attempts must be at least 1".into(),
            ));
        }
        validate_drive_power("global defaults", self.defaults.drive_power)?;

        for band in self.bands.iter().filter(|b| b.enabled) {
            validate_band(band)?;
            if let Some(watts) = band.drive_power {
                validate_drive_power(&band.label, watts)?;
            }
        }
        Ok(())
    }

    /// Build integer-Hz band plans, restricted to and ordered by `selected`
    /// when it is non-empty, otherwise every enabled band in file order.
    pub fn band_plans(&self, selected: &[String]) -> TrainerResult<Vec<BandPlan>> {
        let enabled: Vec<&BandConfig> = self.bands.iter().filter(|b| b.enabled).collect();

        let chosen: Vec<&BandConfig> = if selected.is_empty() {
            enabled
        } else {
            let mut chosen = Vec::with_capacity(selected.len());
            let mut missing = Vec::new();
            for raw in selected {
                let label = normalize_band_label(raw);
                match enabled.iter().find(|b| b.label == label) {
                    Some(band) if !chosen.iter().any(|c: &&BandConfig| c.label == label) => {
                        chosen.push(*band)
                    }
                    Some(_) => {}
                    None => missing.push(label),
                }
            }
            if !missing.is_empty() {
                return Err(TrainerError::Config(format!(
                    "bands not found or not enabled: {}",
                    missing.join(", ")
                )));
            }
            chosen
        };

        chosen
            .into_iter()
            .map(|band| {
                let plan = BandPlan::new(
                    band.label.clone(),
                    Frequency::khz(band.band_start_khz),
                    Frequency::khz(band.band_end_khz),
                    Frequency::khz(band.segment_size_khz).as_hz(),
                    Frequency::khz(band.reference_center_khz),
                )?;
                Ok(match band.drive_power {
                    Some(watts) => plan.with_drive_power(watts),
                    None => plan,
                })
            })
            .collect()
    }
}

/// `"20"` and `"20m"` both select the 20 m band.
pub fn normalize_band_label(raw: &str) -> String {
    let raw = raw.trim();
    if !raw.is_empty() && raw.chars().all(|c| c.is_ascii_digit()) {
        format!("{raw}m")
    } else {
        raw.to_string()
    }
}

fn validate_band(band: &BandConfig) -> TrainerResult<()> {
    for (value, name) in [
        (band.band_start_khz, "band_start_khz"),
        (band.band_end_khz, "band_end_khz"),
    ] {
        if !(0.0..=MAX_BAND_EDGE_KHZ).contains(&value) {
            return Err(TrainerError::Config(format!(
                "{name} for {} is out of range (0-{MAX_BAND_EDGE_KHZ}): {value}",
                band.label
            )));
        }
    }
    if band.band_end_khz <= band.band_start_khz {
        return Err(TrainerError::Config(format!(
            "band_end_khz for {} must be above band_start_khz",
            band.label
        )));
    }
    if band.segment_size_khz <= 0.0 {
        return Err(TrainerError::Config(format!(
            "segment_size_khz for {} must be > 0",
            band.label
        )));
    }
    Ok(())
}

fn validate_drive_power(scope: &str, watts: u32) -> TrainerResult<()> {
    if !(MIN_DRIVE_WATTS..=MAX_DRIVE_WATTS).contains(&watts) {
        return Err(TrainerError::Config(format!(
            "drive_power for '{scope}' is {watts} W; the RF2K-S requires {MIN_DRIVE_WATTS}-{MAX_DRIVE_WATTS} W"
        )));
    }
    if watts < RECOMMENDED_MIN_DRIVE_WATTS {
        log::warn!(
            "drive_power for '{scope}' is only {watts} W; at least {RECOMMENDED_MIN_DRIVE_WATTS} W tunes more accurately"
        );
    }
    Ok(())
}
