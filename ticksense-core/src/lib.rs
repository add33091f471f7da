//! Core acquisition engine for TickSense
//!
//! Everything a firmware port needs to run a set of environmental sensors
//! cooperatively: a lifecycle FSM per sensor, shared register transport,
//! interrupt-edge pulse capture, sample filtering and topic publishing.
//!
//! Key constraints:
//! - Runs on 32KB RAM class microcontrollers
//! - No heap allocation anywhere; all storage is `heapless`
//! - A runtime tick never blocks for more than one bus transaction
//!
//! ```
//! use ticksense_core::filter::{FilterMode, SampleFilter};
//! use ticksense_core::time::Millis;
//!
//! let mut filter = SampleFilter::new(FilterMode::Medium.params(0.1));
//!
//! // Four raw samples form one window; the window mean is the candidate.
//! let mut published = None;
//! for (i, v) in [20.1f32, 20.2, 20.2, 20.3].into_iter().enumerate() {
//!     if let Some(mean) = filter.offer(v, Millis(i as u32 * 1_000)) {
//!         published = Some(mean);
//!     }
//! }
//! assert!((published.unwrap() - 20.2).abs() < 0.05);
//! ```

#![cfg_attr(not(feature = "std"), no_std)]
#![deny(unsafe_code)]
#![warn(missing_docs)]

pub mod bus;
pub mod constants;
pub mod errors;
pub mod filter;
pub mod fsm;
pub mod history;
pub mod plausibility;
pub mod pulse;
pub mod slot;
pub mod time;
pub mod topic;
pub mod transport;

// Public API
pub use bus::Publisher;
pub use errors::{SensorError, SensorResult, TransportError, TransportResult, WireFault};
pub use filter::{FilterMode, FilterParams, SampleFilter};
pub use fsm::{
    CommandOutcome, Phase, Reading, Readings, SensorConfig, SensorLogic, SensorRuntime,
    WatchdogSpec,
};
pub use time::{Clock, Micros, Millis};
pub use topic::Channel;
pub use transport::RegisterBus;

/// Crate version, straight from the manifest.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
