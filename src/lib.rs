//! RF2K-S Trainer
//!
//! Steps a transceiver through every segment of the RF2K-S amplifier's tuning
//! grid so the operator can key a carrier, tune and store a match.
//!
//! ## Architecture (Hexagonal / Ports & Adapters)
//!
//! - `domain/` - Pure domain types, no I/O dependencies
//! - `ports/` - Trait definitions (interfaces) for radio, amplifier, console, telemetry
//! - `plan/` - Segment grid arithmetic and tuning plans (pure functions, no I/O)
//! - `net/` - Line framing and socket helpers shared by the radio backends
//! - `flex/` - FlexRadio SmartSDR backend (event-driven)
//! - `rigctl/` - Hamlib rigctld backend (polling)
//! - `ptt/` - PTT acquisition state machine
//! - `sequencer/` - The tuning run itself
//! - `adapters/` - Terminal console, telemetry, RF2K-S REST reader, mock radio

// Core domain (pure, no I/O)
pub mod domain;
pub mod plan;
pub mod ports;

// Radio backends
pub mod flex;
pub mod net;
pub mod rigctl;

// Orchestration
pub mod ptt;
pub mod sequencer;

// Adapters (external I/O)
pub mod adapters;
