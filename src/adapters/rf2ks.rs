//! RF2K-S amplifier REST reader
//!
//! The amplifier exposes a small JSON API on port 8080. Readings come back
//! as `{"value": .., "unit": ..}` objects, either at the top level or nested
//! under a named field depending on firmware.
//!
//! Besides reading, the client can put the amplifier in STANDBY before a
//! run (`PUT /operate-mode`) so the radio's carrier only drives the tuner.

use std::fmt;
use std::time::Duration;

use serde::Deserialize;
use serde_json::{json, Value};

use crate::domain::{AmplifierSettings, TrainerError, TrainerResult};
use crate::ports::{
    AmplifierMonitor, AmplifierReadings, FrequencyUnit, ReportedFrequency, TunerSetting,
};

const REQUEST_TIMEOUT: Duration = Duration::from_secs(3);
const INFO_TIMEOUT: Duration = Duration::from_secs(8);
const TUNER_TIMEOUT: Duration = Duration::from_secs(7);

/// Amplifier operate mode as `/operate-mode` spells it
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OperateMode {
    Operate,
    Standby,
}

impl OperateMode {
    pub fn as_str(self) -> &'static str {
        match self {
            OperateMode::Operate => "OPERATE",
            OperateMode::Standby => "STANDBY",
        }
    }
}

impl fmt::Display for OperateMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Identification block from `GET /info`
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AmplifierInfo {
    #[serde(default)]
    pub device: Option<String>,
    #[serde(default)]
    pub custom_device_name: Option<String>,
    #[serde(default)]
    pub software_version: Option<SoftwareVersion>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct SoftwareVersion {
    #[serde(rename = "GUI", default)]
    pub gui: Option<String>,
    #[serde(default)]
    pub controller: Option<String>,
}

pub struct Rf2ksClient {
    base_url: String,
    http: reqwest::blocking::Client,
}

impl Rf2ksClient {
    pub fn new(settings: &AmplifierSettings) -> TrainerResult<Self> {
        let base_url = settings
            .base_url()
            .ok_or_else(|| TrainerError::Config("amplifier.host is not set".into()))?;
        let http = reqwest::blocking::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| TrainerError::Amplifier(format!("HTTP client: {e}")))?;
        Ok(Self { base_url, http })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Fetch and log the identification block. Used as a reachability check at startup.
    pub fn fetch_info(&self) -> TrainerResult<AmplifierInfo> {
        let info: AmplifierInfo = serde_json::from_value(self.get_json("info", INFO_TIMEOUT)?)
            .map_err(|e| TrainerError::Amplifier(format!("/info: {e}")))?;
        let na = "N/A";
        let version = info.software_version.clone().unwrap_or_default();
        log::info!("[RF2K-S] Amplifier Info:");
        log::info!("  Device:     {}", info.device.as_deref().unwrap_or(na));
        log::info!("  Name:       {}", info.custom_device_name.as_deref().unwrap_or(na));
        log::info!("  FW GUI:     {}", version.gui.as_deref().unwrap_or(na));
        log::info!("  FW Ctrl:    {}", version.controller.as_deref().unwrap_or(na));
        Ok(info)
    }

    /// Current operate mode, uppercased. Unknown spellings come back as-is.
    pub fn operate_mode(&self) -> TrainerResult<String> {
        let body = self.get_json("operate-mode", REQUEST_TIMEOUT).map_err(|e| {
            log::warn!("[RF2K-S] Could not retrieve operate mode: {e}");
            e
        })?;
        Ok(body
            .get("operate_mode")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_ascii_uppercase())
    }

    /// Switch the operate mode, skipping the PUT when it is already set.
    pub fn set_operate_mode(&self, mode: OperateMode) -> TrainerResult<()> {
        if self.operate_mode()? == mode.as_str() {
            log::info!("[RF2K-S] Amplifier already in {mode} mode. No action needed.");
            return Ok(());
        }
        let url = format!("{}/operate-mode", self.base_url);
        self.http
            .put(&url)
            .header("Accept", "application/json")
            .json(&json!({ "operate_mode": mode.as_str() }))
            .timeout(REQUEST_TIMEOUT)
            .send()
            .and_then(|r| r.error_for_status())
            .map_err(|e| {
                log::error!("[RF2K-S] Failed to set {mode} mode: {e}");
                TrainerError::Amplifier(format!("PUT {url}: {e}"))
            })?;
        log::info!("[RF2K-S] Amplifier successfully set to {mode} mode.");
        Ok(())
    }

    fn get_json(&self, path: &str, timeout: Duration) -> TrainerResult<Value> {
        let url = format!("{}/{path}", self.base_url);
        let response = self
            .http
            .get(&url)
            .header("Accept", "application/json")
            .timeout(timeout)
            .send()
            .and_then(|r| r.error_for_status())
            .map_err(|e| TrainerError::Amplifier(format!("GET {url}: {e}")))?;
        response
            .json::<Value>()
            .map_err(|e| TrainerError::Amplifier(format!("GET {url}: invalid JSON: {e}")))
    }
}

impl AmplifierMonitor for Rf2ksClient {
    fn reported_frequency(&mut self) -> TrainerResult<ReportedFrequency> {
        parse_frequency(&self.get_json("data", REQUEST_TIMEOUT)?)
    }

    fn readings(&mut self) -> TrainerResult<AmplifierReadings> {
        parse_power(&self.get_json("power", REQUEST_TIMEOUT)?)
    }

    fn tuner_setting(&mut self) -> TrainerResult<TunerSetting> {
        let setting = parse_tuner(&self.get_json("tuner", TUNER_TIMEOUT)?)?;
        if setting.is_bypassed() {
            log::info!(
                "[RF2K-S] Tuner bypassed for the frequency {} kHz.",
                setting.tuned_khz
            );
        }
        Ok(setting)
    }
}

/// `/tuner` body. Frequency and segment size are required; a missing or
/// non-numeric `L`/`C` means the amplifier bypassed the tuner.
pub fn parse_tuner(body: &Value) -> TrainerResult<TunerSetting> {
    let value = |key: &str| body.get(key).and_then(|v| v.get("value")).and_then(Value::as_f64);
    let required = |key: &str| {
        value(key).ok_or_else(|| TrainerError::Amplifier(format!("/tuner has no '{key}': {body}")))
    };
    let text = |key: &str| match body.get(key) {
        Some(Value::String(s)) => s.clone(),
        Some(Value::Null) | None => String::new(),
        Some(other) => other.to_string(),
    };
    let (inductance_nh, capacitance_pf) = match (value("L"), value("C")) {
        (Some(l), Some(c)) => (Some(l), Some(c)),
        _ => (None, None),
    };
    Ok(TunerSetting {
        tuned_khz: required("tuned_frequency")?,
        segment_khz: required("segment_size")?,
        mode: text("mode"),
        setup: text("setup"),
        inductance_nh,
        capacitance_pf,
    })
}

/// `{"frequency": {"value", "unit"}}` or a bare `{"value", "unit"}`.
/// A missing unit means kHz, the amplifier's native unit.
pub fn parse_frequency(body: &Value) -> TrainerResult<ReportedFrequency> {
    let reading = body.get("frequency").unwrap_or(body);
    let value = reading
        .get("value")
        .and_then(Value::as_f64)
        .ok_or_else(|| TrainerError::Amplifier(format!("/data has no frequency value: {body}")))?;
    let unit = match reading.get("unit") {
        Some(u) => serde_json::from_value::<FrequencyUnit>(u.clone())
            .map_err(|e| TrainerError::Amplifier(format!("/data unit {u}: {e}")))?,
        None => FrequencyUnit::KHz,
    };
    Ok(ReportedFrequency::new(value, unit))
}

/// `{"forward": .., "swr": ..}` where each is a number or a `{"value"}` object.
pub fn parse_power(body: &Value) -> TrainerResult<AmplifierReadings> {
    let number = |key: &str| {
        body.get(key)
            .and_then(|v| v.as_f64().or_else(|| v.get("value").and_then(Value::as_f64)))
            .ok_or_else(|| TrainerError::Amplifier(format!("/power has no '{key}': {body}")))
    };
    Ok(AmplifierReadings {
        forward_watts: number("forward")?,
        swr: number("swr")?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::{BufRead, BufReader, Read, Write};
    use std::net::TcpListener;
    use std::sync::{Arc, Mutex};

    #[test]
    fn nested_frequency_with_unit() {
        let r = parse_frequency(&json!({"frequency": {"value": 14070.9, "unit": "kHz"}})).unwrap();
        assert_eq!(r.unit, FrequencyUnit::KHz);
        assert_eq!(r.truncated_khz().unwrap(), 14_070);
    }

    #[test]
    fn bare_frequency_defaults_to_khz() {
        let r = parse_frequency(&json!({"value": 7012})).unwrap();
        assert_eq!(r, ReportedFrequency::new(7012.0, FrequencyUnit::KHz));
    }

    #[test]
    fn frequency_without_value_is_an_amplifier_error() {
        let err = parse_frequency(&json!({"status": "standby"})).unwrap_err();
        assert!(matches!(err, TrainerError::Amplifier(_)));
    }

    #[test]
    fn power_accepts_numbers_or_value_objects() {
        let r = parse_power(&json!({"forward": {"value": 480, "unit": "W"}, "swr": 1.2})).unwrap();
        assert_eq!(r.forward_watts, 480.0);
        assert_eq!(r.swr, 1.2);
        assert!(parse_power(&json!({"forward": 480})).is_err());
    }

    #[test]
    fn tuner_with_stored_match() {
        let t = parse_tuner(&json!({
            "tuned_frequency": {"value": 7012, "unit": "kHz"},
            "segment_size": {"value": 25, "unit": "kHz"},
            "mode": "AUTO",
            "setup": "ANT1",
            "L": {"value": 1250, "unit": "nH"},
            "C": {"value": 330, "unit": "pF"}
        }))
        .unwrap();
        assert_eq!(t.tuned_khz, 7012.0);
        assert_eq!(t.segment_khz, 25.0);
        assert_eq!(t.mode, "AUTO");
        assert_eq!(t.inductance_nh, Some(1250.0));
        assert_eq!(t.capacitance_pf, Some(330.0));
        assert!(!t.is_bypassed());
    }

    #[test]
    fn tuner_without_l_and_c_is_bypassed() {
        let t = parse_tuner(&json!({
            "tuned_frequency": {"value": 5359},
            "segment_size": {"value": 10},
            "mode": 1,
            "setup": null,
            "C": {"value": 100}
        }))
        .unwrap();
        assert!(t.is_bypassed());
        assert_eq!(t.capacitance_pf, None, "half a match is no match");
        assert_eq!(t.mode, "1");
        assert_eq!(t.setup, "");
    }

    #[test]
    fn tuner_without_frequency_is_an_error() {
        assert!(parse_tuner(&json!({"segment_size": {"value": 10}})).is_err());
    }

    #[test]
    fn client_requires_a_host() {
        let settings = AmplifierSettings::default();
        assert!(matches!(
            Rf2ksClient::new(&settings),
            Err(TrainerError::Config(_))
        ));
    }

    #[test]
    fn unreachable_amplifier_reports_amplifier_error() {
        // Bind then drop so the port is closed
        let port = std::net::TcpListener::bind("127.0.0.1:0")
            .unwrap()
            .local_addr()
            .unwrap()
            .port();
        let settings = AmplifierSettings {
            enabled: true,
            host: Some("127.0.0.1".into()),
            port,
            ..Default::default()
        };
        let mut client = Rf2ksClient::new(&settings).unwrap();
        assert!(matches!(
            client.reported_frequency(),
            Err(TrainerError::Amplifier(_))
        ));
    }

    /// One-request-per-connection HTTP server answering from `routes`
    /// (`"GET /path"` -> JSON body) and recording every request line and body.
    fn fake_amplifier(routes: Vec<(&'static str, &'static str)>) -> (u16, Arc<Mutex<Vec<String>>>) {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let port = listener.local_addr().unwrap().port();
        let seen = Arc::new(Mutex::new(Vec::new()));
        let log = Arc::clone(&seen);
        std::thread::spawn(move || {
            for stream in listener.incoming() {
                let Ok(stream) = stream else { break };
                let mut writer = stream.try_clone().unwrap();
                let mut reader = BufReader::new(stream);
                let mut request = String::new();
                reader.read_line(&mut request).unwrap();
                let mut length = 0;
                loop {
                    let mut header = String::new();
                    reader.read_line(&mut header).unwrap();
                    let header = header.trim();
                    if header.is_empty() {
                        break;
                    }
                    if let Some((name, value)) = header.split_once(':') {
                        if name.eq_ignore_ascii_case("content-length") {
                            length = value.trim().parse().unwrap();
                        }
                    }
                }
                let mut body = vec![0u8; length];
                reader.read_exact(&mut body).unwrap();
                let route = request.split_whitespace().take(2).collect::<Vec<_>>().join(" ");
                let mut entry = route.clone();
                if !body.is_empty() {
                    entry.push(' ');
                    entry.push_str(&String::from_utf8_lossy(&body));
                }
                log.lock().unwrap().push(entry);
                let reply = routes
                    .iter()
                    .find(|(r, _)| *r == route)
                    .map(|(_, b)| *b)
                    .unwrap_or("{}");
                let _ = write!(
                    writer,
                    "HTTP/1.1 200 OK\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{reply}",
                    reply.len()
                );
            }
        });
        (port, seen)
    }

    fn client(port: u16) -> Rf2ksClient {
        Rf2ksClient::new(&AmplifierSettings {
            enabled: true,
            host: Some("127.0.0.1".into()),
            port,
            ..Default::default()
        })
        .unwrap()
    }

    #[test]
    fn standby_is_put_when_operating() {
        let (port, seen) = fake_amplifier(vec![("GET /operate-mode", r#"{"operate_mode": "operate"}"#)]);
        client(port).set_operate_mode(OperateMode::Standby).unwrap();
        let seen = seen.lock().unwrap();
        assert_eq!(seen.len(), 2);
        assert_eq!(seen[0], "GET /operate-mode");
        assert!(seen[1].starts_with("PUT /operate-mode"));
        let body: Value = serde_json::from_str(seen[1].trim_start_matches("PUT /operate-mode ")).unwrap();
        assert_eq!(body, json!({"operate_mode": "STANDBY"}));
    }

    #[test]
    fn standby_is_not_put_twice() {
        let (port, seen) = fake_amplifier(vec![("GET /operate-mode", r#"{"operate_mode": "STANDBY"}"#)]);
        client(port).set_operate_mode(OperateMode::Standby).unwrap();
        assert_eq!(seen.lock().unwrap().as_slice(), ["GET /operate-mode"]);
    }

    #[test]
    fn tuner_is_read_over_http() {
        let (port, seen) = fake_amplifier(vec![(
            "GET /tuner",
            r#"{"tuned_frequency": {"value": 14025}, "segment_size": {"value": 50}, "mode": "AUTO", "setup": "A"}"#,
        )]);
        let setting = client(port).tuner_setting().unwrap();
        assert_eq!(setting.tuned_khz, 14_025.0);
        assert!(setting.is_bypassed());
        assert_eq!(seen.lock().unwrap().as_slice(), ["GET /tuner"]);
    }
}
