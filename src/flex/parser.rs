//! Pure classification of SmartSDR status lines.
//!
//! Every matcher runs on every line and is a no-op when its keyword is
//! absent, so one line can produce zero, one or several events. Small
//! framing differences between firmware versions (a `|` straight before a
//! keyword, extra fields) do not matter because we only look at tokens.

use crate::domain::Frequency;

/// Partial slice update; only the fields present on the line are set.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SliceUpdate {
    pub frequency: Option<Frequency>,
    pub mode: Option<String>,
    pub transmit: Option<bool>,
}

/// One fact extracted from an inbound line
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FlexEvent {
    Identity {
        nickname: Option<String>,
        callsign: Option<String>,
    },
    Slice {
        id: u32,
        update: SliceUpdate,
    },
    Interlock {
        state: String,
    },
    TransmitPower {
        rfpower: Option<u32>,
        tunepower: Option<u32>,
    },
}

/// Split on whitespace and on the `|` field separator.
fn tokens(line: &str) -> impl Iterator<Item = &str> {
    line.split(|c: char| c.is_whitespace() || c == '|')
        .filter(|t| !t.is_empty())
}

/// Value of the first `key=value` token whose key matches exactly.
fn field<'a>(line: &'a str, key: &str) -> Option<&'a str> {
    tokens(line).find_map(|t| {
        t.split_once('=')
            .filter(|(k, _)| *k == key)
            .map(|(_, v)| v)
    })
}

fn leading<F: Fn(char) -> bool>(value: &str, accept: F) -> &str {
    let end = value
        .char_indices()
        .find(|(_, c)| !accept(*c))
        .map_or(value.len(), |(i, _)| i);
    &value[..end]
}

fn parse_u32(value: &str) -> Option<u32> {
    leading(value, |c| c.is_ascii_digit()).parse().ok()
}

fn parse_identity(line: &str) -> Option<FlexEvent> {
    if !(line.starts_with('H')
        || line.contains(" radio ")
        || line.contains("nickname=")
        || line.contains("callsign="))
    {
        return None;
    }
    let nickname = field(line, "nickname").map(str::to_string);
    let callsign = field(line, "callsign").map(str::to_string);
    if nickname.is_none() && callsign.is_none() {
        return None;
    }
    Some(FlexEvent::Identity { nickname, callsign })
}

fn parse_slice(line: &str) -> Option<FlexEvent> {
    let mut iter = tokens(line);
    let id = loop {
        let tok = iter.next()?;
        if tok == "slice" {
            if let Some(id) = iter.next().and_then(|t| t.parse::<u32>().ok()) {
                break id;
            }
        }
    };

    let frequency = field(line, "RF_frequency")
        .or_else(|| field(line, "freq"))
        .and_then(|v| Frequency::parse_mhz(leading(v, |c| c.is_ascii_digit() || c == '.')));
    let mode = field(line, "mode")
        .map(|v| leading(v, |c| c.is_ascii_alphanumeric()))
        .filter(|m| !m.is_empty())
        .map(str::to_string);
    let transmit = match field(line, "tx") {
        Some("1") => Some(true),
        Some("0") => Some(false),
        _ => None,
    };

    Some(FlexEvent::Slice {
        id,
        update: SliceUpdate {
            frequency,
            mode,
            transmit,
        },
    })
}

fn parse_interlock(line: &str) -> Option<FlexEvent> {
    if !line.contains("interlock") {
        return None;
    }
    let state = leading(field(line, "state")?, |c| c.is_ascii_uppercase() || c == '_');
    if state.is_empty() {
        return None;
    }
    Some(FlexEvent::Interlock {
        state: state.to_string(),
    })
}

fn parse_transmit(line: &str) -> Option<FlexEvent> {
    if !line.contains("transmit") {
        return None;
    }
    let rfpower = field(line, "rfpower").and_then(parse_u32);
    let tunepower = field(line, "tunepower").and_then(parse_u32);
    if rfpower.is_none() && tunepower.is_none() {
        return None;
    }
    Some(FlexEvent::TransmitPower { rfpower, tunepower })
}

/// Run every matcher against `line`.
pub fn parse_line(line: &str) -> Vec<FlexEvent> {
    if line.is_empty() {
        return Vec::new();
    }
    [
        parse_identity(line),
        parse_slice(line),
        parse_interlock(line),
        parse_transmit(line),
    ]
    .into_iter()
    .flatten()
    .collect()
}

/// `TRANSMITTING`, or any `TX*` state, counts as on the air. `NOT_READY` and friends do not.
pub fn interlock_is_transmitting(state: &str) -> bool {
    state == "TRANSMITTING" || (state.starts_with("TX") && !state.starts_with("NOT_"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn slice_line_with_all_fields() {
        let events = parse_line("S1A2B3C4|slice 0 in_use=1 RF_frequency=7.090000 mode=LSB tx=1");
        assert_eq!(
            events,
            vec![FlexEvent::Slice {
                id: 0,
                update: SliceUpdate {
                    frequency: Some(Frequency::hz(7_090_000)),
                    mode: Some("LSB".into()),
                    transmit: Some(true),
                },
            }]
        );
    }

    #[test]
    fn slice_line_with_only_mode() {
        let events = parse_line("S0|slice 1 mode=CW");
        assert_eq!(
            events,
            vec![FlexEvent::Slice {
                id: 1,
                update: SliceUpdate {
                    mode: Some("CW".into()),
                    ..Default::default()
                },
            }]
        );
    }

    #[test]
    fn freq_is_accepted_when_rf_frequency_missing() {
        let events = parse_line("S0|slice 2 freq=14.070000");
        match &events[..] {
            [FlexEvent::Slice { id: 2, update }] => {
                assert_eq!(update.frequency, Some(Frequency::hz(14_070_000)))
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn interlock_state_is_extracted() {
        assert_eq!(
            parse_line("S0|interlock state=TRANSMITTING reason="),
            vec![FlexEvent::Interlock {
                state: "TRANSMITTING".into()
            }]
        );
    }

    #[test]
    fn transmit_power_fields() {
        assert_eq!(
            parse_line("S0|transmit rfpower=13 tunepower=10 am_carrier_level=100"),
            vec![FlexEvent::TransmitPower {
                rfpower: Some(13),
                tunepower: Some(10)
            }]
        );
    }

    #[test]
    fn identity_line() {
        assert_eq!(
            parse_line("H1234|radio nickname=RemoteQTH callsign=SA6TUT"),
            vec![FlexEvent::Identity {
                nickname: Some("RemoteQTH".into()),
                callsign: Some("SA6TUT".into())
            }]
        );
    }

    #[test]
    fn unrelated_lines_produce_nothing() {
        assert!(parse_line("R12|0|").is_empty());
        assert!(parse_line("S0|meter 12.4").is_empty());
        assert!(parse_line("").is_empty());
    }

    #[test]
    fn keyword_needs_a_whole_token() {
        // "submode=" is not "mode="
        let events = parse_line("S0|slice 0 submode=XX");
        match &events[..] {
            [FlexEvent::Slice { update, .. }] => assert_eq!(update.mode, None),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn interlock_classification() {
        assert!(interlock_is_transmitting("TRANSMITTING"));
        assert!(interlock_is_transmitting("TX_REQUESTED"));
        assert!(!interlock_is_transmitting("READY"));
        assert!(!interlock_is_transmitting("NOT_READY"));
        assert!(!interlock_is_transmitting("RECEIVE"));
    }
}
