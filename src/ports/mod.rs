//! Port traits (interfaces)
//!
//! These traits define the boundaries between the tuning core and the
//! outside world. Adapters implement them for real hardware and terminals;
//! tests implement them with scripted fakes.

pub mod amplifier;
pub mod console;
pub mod radio;
pub mod telemetry;

pub use amplifier::*;
pub use console::*;
pub use radio::*;
pub use telemetry::*;
