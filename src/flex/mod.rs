//! FlexRadio SmartSDR backend.
//!
//! - `transport`: TCP connection, `C<seq>|cmd` framing, ACK correlation, listener thread
//! - `parser`: pure line classification into typed `FlexEvent`s
//! - `link`: `EventDrivenRadioLink`, the `RadioLink` implementation built on both

pub mod link;
pub mod parser;
pub mod transport;

pub use link::{EventDrivenRadioLink, FlexMirror};
pub use parser::{parse_line, FlexEvent, SliceUpdate};
pub use transport::{parse_ack, Ack, AckTransport, LineObserver};
