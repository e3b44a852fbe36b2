//! Domain types for barsync

pub mod bar;
pub mod instrument;
pub mod interval;

pub use bar::{Bar, BarTimestamp};
pub use instrument::Instrument;
pub use interval::{Interval, IntervalParseError};
