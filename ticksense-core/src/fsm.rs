//! Sensor Lifecycle FSM
//!
//! ## Cooperative Acquisition
//!
//! Every sensor instance is driven by a [`SensorRuntime`], which the
//! platform ticks from its main loop (nominally every 50 ms). A tick
//! performs at most one bus transaction and at most one phase transition,
//! then returns; nothing in here sleeps or spins. Drivers that need
//! several transactions to start a measurement stage them across ticks by
//! returning `nb::Error::WouldBlock` from [`SensorLogic::start_measurement`].
//!
//! ```text
//!                 begin() ok
//! UNAVAILABLE ◄──────────────► IDLE ──poll due──► MEASUREMENT_START
//!      ▲  begin() failed        ▲                     │ start ok
//!      │  wrong chip            │                     ▼
//!      │                        │              MEASUREMENT_WAIT
//!      │                 poll elapsed                 │ ready
//!      │                        │                     ▼
//!      │                WAIT_NEXT_MEAS ◄──────────DATA_READ
//!      │                    ▲      ▲   filter+publish
//!      │     soft failure───┘      │
//!      │                           │ re-init ok
//!      └───wrong chip── ERROR_WAIT─┘
//!            (re-init)      ▲
//!        N soft failures────┘
//! ```
//!
//! ## Failure Policy
//!
//! - A transport or frame fault in any phase is a *soft failure*: it is
//!   published on the error channel, counted, and the cycle is dropped.
//! - After [`FAILURE_THRESHOLD`] consecutive soft failures the runtime
//!   cools down in `ErrorWait` for [`ERROR_WAIT_MS`], then re-runs the
//!   driver's full initialization.
//! - A wrong-chip probe result is permanent: the runtime parks in
//!   `Unavailable` and only an explicit [`SensorRuntime::begin`] retries.
//! - A conversion that outlives the driver's deadline drops the cycle and
//!   counts as a soft failure.
//!
//! Sensors that are known to lock up silently declare a hardware watchdog
//! via [`SensorLogic::watchdog`]: if no non-zero reading arrives within the
//! allowance, the runtime re-initializes the driver. The allowance is wider
//! right after initialization than in steady state.
//!
//! ## Commands
//!
//! The runtime answers messages on its own topic prefix between ticks:
//! filter mode get/set, oversampling get/set, cached `<channel>/get`
//! re-publication (byte-identical to the original), a calibration dump,
//! and driver-specific commands forwarded to [`SensorLogic::command`].
//! Command handling never disturbs a running measurement cycle.

use core::fmt;

use heapless::Vec;

use crate::bus::Publisher;
use crate::constants::timing::{
    CONVERSION_TIMEOUT_MS, DEFAULT_POLL_RATE_MS, ERROR_WAIT_MS, FAILURE_THRESHOLD,
};
use crate::errors::{SensorError, SensorResult};
use crate::filter::{FilterMode, FilterParams, SampleFilter};
use crate::time::{Clock, Micros, Millis};
use crate::topic::{self, CalDump, Channel, SensorName, TopicString};

#[cfg(feature = "log")]
macro_rules! log_warn {
    ($($arg:tt)*) => { log::warn!($($arg)*) };
}

#[cfg(not(feature = "log"))]
macro_rules! log_warn {
    ($($arg:tt)*) => {};
}

/// Most channels any single sensor publishes.
pub const MAX_CHANNELS: usize = 8;

/// One calibrated value leaving a driver.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Reading {
    /// Channel the value belongs to.
    pub channel: Channel,
    /// Calibrated physical value.
    pub value: f32,
}

/// Readings produced by one measurement cycle.
pub type Readings = Vec<Reading, MAX_CHANNELS>;

/// Lifecycle phases of a sensor runtime.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Phase {
    /// Not initialized, or locked out after a permanent fault.
    Unavailable,
    /// Waiting for the next measurement cycle to come due.
    Idle,
    /// Kicking the measurement off, possibly across several ticks.
    MeasurementStart,
    /// Conversion running; polling for completion.
    MeasurementWait,
    /// Fetching and publishing the finished values.
    DataRead,
    /// Cycle finished; lingering until the poll interval has elapsed.
    WaitNextMeasurement,
    /// Cooling down after repeated failures before re-initialization.
    ErrorWait,
}

/// Watchdog allowances for sensors that lock up silently.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WatchdogSpec {
    /// Allowance right after (re-)initialization, ms.
    pub startup_ms: u32,
    /// Allowance in steady state, ms.
    pub runtime_ms: u32,
}

/// Driver verdict on a forwarded command.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommandOutcome {
    /// The driver consumed the command.
    Handled,
    /// The driver does not know this command; it is silently ignored.
    Ignored,
}

/// Chip-specific half of a sensor: probing, measuring, calibrating.
///
/// Implementations own their transport (register bus handle, pins, capture
/// slots). The runtime owns scheduling, filtering, publishing and failure
/// policy. Transport work belongs in the three measurement methods so the
/// one-transaction-per-tick budget holds; command handling must not touch
/// the bus.
pub trait SensorLogic {
    /// Channels this sensor publishes. Fixed for the sensor's lifetime.
    fn channels(&self) -> &'static [Channel];

    /// Probe the hardware, load calibration, write configuration.
    ///
    /// Runs outside the tick budget and may issue several transactions
    /// back to back. A `WrongHardwareAtAddress` here locks the sensor out.
    fn begin(&mut self) -> SensorResult<()>;

    /// Kick one measurement off.
    ///
    /// `WouldBlock` means "call again next tick" - one staged transaction
    /// per call keeps the tick budget intact.
    fn start_measurement(&mut self, now: Micros) -> nb::Result<(), SensorError>;

    /// Poll whether the conversion has finished.
    ///
    /// `waited_ms` is the time spent in the wait phase so far; drivers with
    /// a fixed conversion time use it instead of a status register.
    fn data_ready(&mut self, waited_ms: u32) -> nb::Result<(), SensorError>;

    /// Fetch the finished measurement and push calibrated values.
    ///
    /// Implementations burst-read in one transaction where the hardware
    /// allows it. Values that fail the driver's plausibility gates are
    /// simply not pushed.
    fn read_values(&mut self, now: Millis, out: &mut Readings) -> SensorResult<()>;

    /// Upper bound on the conversion wait before the cycle is dropped.
    fn conversion_timeout_ms(&self) -> u32 {
        CONVERSION_TIMEOUT_MS
    }

    /// Base deadband for a channel; the filter presets scale around it.
    fn base_eps(&self, channel: Channel) -> f32 {
        let _ = channel;
        0.1
    }

    /// Filter parameters for a channel under a mode.
    ///
    /// The default derives them from the preset and [`Self::base_eps`];
    /// override for channels that need their own triple.
    fn filter_params(&self, channel: Channel, mode: FilterMode) -> FilterParams {
        mode.params(self.base_eps(channel))
    }

    /// Current oversampling setting, if the chip has one.
    fn oversampling(&self) -> Option<u8> {
        None
    }

    /// Stage a new oversampling setting; applied with the next cycle.
    ///
    /// `Ok(false)` means the chip does not support it and the command is
    /// ignored.
    fn set_oversampling(&mut self, ratio: u8) -> SensorResult<bool> {
        let _ = ratio;
        Ok(false)
    }

    /// Render the calibration blob as `key=value` pairs for diagnostics.
    fn calibration_text(&self, out: &mut CalDump) {
        let _ = out;
    }

    /// Driver-specific command hook (e.g. altitude configuration).
    fn command(&mut self, suffix: &str, payload: &str) -> CommandOutcome {
        let _ = (suffix, payload);
        CommandOutcome::Ignored
    }

    /// Hardware watchdog allowances, for chips that lock up silently.
    fn watchdog(&self) -> Option<WatchdogSpec> {
        None
    }
}

/// Instance configuration: name on the bus, cycle spacing, filter preset.
#[derive(Debug, Clone)]
pub struct SensorConfig {
    /// Instance name; first topic level of everything published.
    pub name: SensorName,
    /// Spacing between measurement cycles, ms.
    pub poll_rate_ms: u32,
    /// Initial filter preset.
    pub mode: FilterMode,
}

impl SensorConfig {
    /// Configuration with default cycle spacing and the `MEDIUM` preset.
    pub fn new(name: &str) -> Self {
        let mut owned = SensorName::new();
        for c in name.chars() {
            if owned.push(c).is_err() {
                break;
            }
        }
        Self {
            name: owned,
            poll_rate_ms: DEFAULT_POLL_RATE_MS,
            mode: FilterMode::Medium,
        }
    }

    /// Override the cycle spacing.
    pub fn with_poll_rate_ms(mut self, ms: u32) -> Self {
        self.poll_rate_ms = ms;
        self
    }

    /// Override the initial filter preset.
    pub fn with_mode(mut self, mode: FilterMode) -> Self {
        self.mode = mode;
        self
    }
}

#[derive(Debug, Clone, Copy)]
struct Watchdog {
    spec: WatchdogSpec,
    fed_at: Millis,
    in_startup: bool,
}

impl Watchdog {
    fn arm(spec: WatchdogSpec, now: Millis) -> Self {
        Self {
            spec,
            fed_at: now,
            in_startup: true,
        }
    }

    fn allowance_ms(&self) -> u32 {
        if self.in_startup {
            self.spec.startup_ms
        } else {
            self.spec.runtime_ms
        }
    }

    fn feed(&mut self, now: Millis) {
        self.fed_at = now;
        self.in_startup = false;
    }

    fn expired(&self, now: Millis) -> bool {
        now.elapsed_since(self.fed_at) > self.allowance_ms()
    }
}

/// Scheduling, filtering, publishing and failure policy around one driver.
pub struct SensorRuntime<L: SensorLogic> {
    logic: L,
    config: SensorConfig,
    phase: Phase,
    /// Start of the current (or last) measurement cycle.
    cycle_start: Millis,
    /// When the current phase was entered.
    phase_entered: Millis,
    soft_failures: u8,
    filters: Vec<(Channel, SampleFilter), MAX_CHANNELS>,
    /// Last published value per channel, for cached `<channel>/get`.
    last_values: Vec<(Channel, f32), MAX_CHANNELS>,
    watchdog: Option<Watchdog>,
}

impl<L: SensorLogic> SensorRuntime<L> {
    /// Wrap a driver. The runtime starts `Unavailable` until [`Self::begin`].
    pub fn new(logic: L, config: SensorConfig) -> Self {
        let mut filters = Vec::new();
        for channel in logic.channels() {
            let params = logic.filter_params(*channel, config.mode);
            let _ = filters.push((*channel, SampleFilter::new(params)));
        }
        Self {
            logic,
            config,
            phase: Phase::Unavailable,
            cycle_start: Millis(0),
            phase_entered: Millis(0),
            soft_failures: 0,
            filters,
            last_values: Vec::new(),
            watchdog: None,
        }
    }

    /// Current lifecycle phase.
    pub fn phase(&self) -> Phase {
        self.phase
    }

    /// Instance name.
    pub fn name(&self) -> &str {
        self.config.name.as_str()
    }

    /// Active filter preset.
    pub fn mode(&self) -> FilterMode {
        self.config.mode
    }

    /// The wrapped driver.
    pub fn logic(&self) -> &L {
        &self.logic
    }

    /// Wildcard pattern covering everything addressed to this sensor.
    pub fn subscription_pattern(&self) -> TopicString {
        self.meta_topic("#")
    }

    /// Initialize the driver and start the first cycle immediately.
    ///
    /// On failure the runtime parks in `Unavailable`; calling `begin` again
    /// is the only way out of that phase.
    pub fn begin(&mut self, clock: &impl Clock, bus: &mut impl Publisher) {
        let now = clock.now_millis();
        match self.logic.begin() {
            Ok(()) => {
                self.soft_failures = 0;
                self.watchdog = self.logic.watchdog().map(|spec| Watchdog::arm(spec, now));
                // Backdate the cycle start so the first tick begins measuring.
                self.cycle_start = now.rewound_by(self.config.poll_rate_ms);
                self.enter(Phase::Idle, now);
            }
            Err(err) => {
                log_warn!("{}: init failed: {}", self.config.name, err);
                self.publish_error(format_args!("{err}"), bus);
                self.enter(Phase::Unavailable, now);
            }
        }
    }

    /// Advance the lifecycle by one cooperative step.
    pub fn tick(&mut self, clock: &impl Clock, bus: &mut impl Publisher) {
        let now = clock.now_millis();

        if !matches!(self.phase, Phase::Unavailable | Phase::ErrorWait) {
            if let Some(wd) = &self.watchdog {
                if wd.expired(now) {
                    log_warn!(
                        "{}: watchdog expired after {} ms, reinitializing",
                        self.config.name,
                        wd.allowance_ms()
                    );
                    self.publish_error(
                        format_args!("watchdog expired after {} ms", wd.allowance_ms()),
                        bus,
                    );
                    self.reinit(clock, bus);
                    return;
                }
            }
        }

        match self.phase {
            Phase::Unavailable => {}
            Phase::Idle => {
                if now.elapsed_since(self.cycle_start) >= self.config.poll_rate_ms {
                    self.cycle_start = now;
                    self.enter(Phase::MeasurementStart, now);
                }
            }
            Phase::MeasurementStart => match self.logic.start_measurement(clock.now_micros()) {
                Ok(()) => self.enter(Phase::MeasurementWait, now),
                Err(nb::Error::WouldBlock) => {}
                Err(nb::Error::Other(err)) => self.fail(err, now, bus),
            },
            Phase::MeasurementWait => {
                let waited = now.elapsed_since(self.phase_entered);
                match self.logic.data_ready(waited) {
                    Ok(()) => self.enter(Phase::DataRead, now),
                    Err(nb::Error::WouldBlock) => {
                        if waited > self.logic.conversion_timeout_ms() {
                            log_warn!(
                                "{}: conversion timeout after {} ms",
                                self.config.name,
                                waited
                            );
                            self.publish_error(
                                format_args!("conversion timeout after {waited} ms"),
                                bus,
                            );
                            self.count_soft_failure(now);
                        }
                    }
                    Err(nb::Error::Other(err)) => self.fail(err, now, bus),
                }
            }
            Phase::DataRead => {
                let mut readings = Readings::new();
                match self.logic.read_values(now, &mut readings) {
                    Ok(()) => {
                        self.soft_failures = 0;
                        let mut nonzero = false;
                        for reading in &readings {
                            if reading.value != 0.0 {
                                nonzero = true;
                            }
                            self.offer_and_publish(reading.channel, reading.value, now, bus);
                        }
                        if nonzero {
                            if let Some(wd) = &mut self.watchdog {
                                wd.feed(now);
                            }
                        }
                        self.enter(Phase::WaitNextMeasurement, now);
                    }
                    Err(err) => self.fail(err, now, bus),
                }
            }
            Phase::WaitNextMeasurement => {
                if now.elapsed_since(self.cycle_start) >= self.config.poll_rate_ms {
                    self.enter(Phase::Idle, now);
                }
            }
            Phase::ErrorWait => {
                if now.elapsed_since(self.phase_entered) >= ERROR_WAIT_MS {
                    self.reinit(clock, bus);
                }
            }
        }
    }

    /// Switch the filter preset on all channels and announce it.
    ///
    /// Filters restart empty, so the first window under the new preset is
    /// always published.
    pub fn set_mode(&mut self, mode: FilterMode, bus: &mut impl Publisher) {
        self.config.mode = mode;
        let Self { logic, filters, .. } = self;
        for (channel, filter) in filters.iter_mut() {
            filter.set_params(logic.filter_params(*channel, mode));
        }
        self.publish_mode(bus);
    }

    /// Dispatch a message if it is addressed to this sensor.
    ///
    /// Returns whether the topic carried this sensor's prefix. Unknown
    /// suffixes under the own prefix are ignored without complaint - the
    /// sensor's own value publications loop back through here when the
    /// platform subscribes it to its full prefix.
    pub fn handle_message(
        &mut self,
        topic_str: &str,
        payload: &str,
        clock: &impl Clock,
        bus: &mut impl Publisher,
    ) -> bool {
        let Some(suffix) = topic::parse_command(topic_str, self.config.name.as_str()) else {
            return false;
        };
        let _ = clock;
        match suffix {
            "mode/get" => self.publish_mode(bus),
            "mode/set" => match FilterMode::parse(payload.trim()) {
                Some(mode) => self.set_mode(mode, bus),
                None => {
                    log_warn!("{}: unknown filter mode '{}'", self.config.name, payload);
                    self.publish_error(format_args!("unknown filter mode: {payload}"), bus);
                }
            },
            "oversampling/get" => {
                if let Some(ratio) = self.logic.oversampling() {
                    let topic = self.meta_topic("oversampling");
                    bus.publish(&topic, &topic::format_payload(format_args!("{ratio}")));
                }
            }
            "oversampling/set" => match payload.trim().parse::<u8>() {
                Ok(ratio) => match self.logic.set_oversampling(ratio) {
                    Ok(true) => {
                        if let Some(current) = self.logic.oversampling() {
                            let topic = self.meta_topic("oversampling");
                            bus.publish(&topic, &topic::format_payload(format_args!("{current}")));
                        }
                    }
                    Ok(false) => {}
                    Err(err) => self.publish_error(format_args!("{err}"), bus),
                },
                Err(_) => {
                    self.publish_error(format_args!("invalid oversampling: {payload}"), bus);
                }
            },
            "calibrationdata/get" => {
                let mut dump = CalDump::new();
                self.logic.calibration_text(&mut dump);
                let topic = self.meta_topic("calibrationdata");
                bus.publish(&topic, &dump);
            }
            other => {
                if let Some(channel_name) = other.strip_suffix("/get") {
                    if let Some(channel) = Channel::from_name(channel_name) {
                        self.republish_cached(channel, bus);
                        return true;
                    }
                }
                let _ = self.logic.command(other, payload);
            }
        }
        true
    }

    fn enter(&mut self, phase: Phase, now: Millis) {
        self.phase = phase;
        self.phase_entered = now;
    }

    fn fail(&mut self, err: SensorError, now: Millis, bus: &mut impl Publisher) {
        log_warn!("{}: {}", self.config.name, err);
        self.publish_error(format_args!("{err}"), bus);
        if err.is_wrong_hardware() {
            self.enter(Phase::Unavailable, now);
            return;
        }
        self.count_soft_failure(now);
    }

    fn count_soft_failure(&mut self, now: Millis) {
        self.soft_failures = self.soft_failures.saturating_add(1);
        if self.soft_failures >= FAILURE_THRESHOLD {
            log_warn!(
                "{}: {} consecutive failures, cooling down",
                self.config.name,
                self.soft_failures
            );
            self.enter(Phase::ErrorWait, now);
        } else {
            self.enter(Phase::WaitNextMeasurement, now);
        }
    }

    /// Full re-initialization after a cooldown or a watchdog trip.
    fn reinit(&mut self, clock: &impl Clock, bus: &mut impl Publisher) {
        let now = clock.now_millis();
        self.soft_failures = 0;
        for (_, filter) in &mut self.filters {
            filter.reset();
        }
        match self.logic.begin() {
            Ok(()) => {
                self.watchdog = self.logic.watchdog().map(|spec| Watchdog::arm(spec, now));
                self.cycle_start = now.rewound_by(self.config.poll_rate_ms);
                self.enter(Phase::Idle, now);
            }
            Err(err) => {
                log_warn!("{}: re-init failed: {}", self.config.name, err);
                self.publish_error(format_args!("{err}"), bus);
                if err.is_wrong_hardware() {
                    self.enter(Phase::Unavailable, now);
                } else {
                    // Another cooldown, another attempt.
                    self.enter(Phase::ErrorWait, now);
                }
            }
        }
    }

    fn offer_and_publish(
        &mut self,
        channel: Channel,
        value: f32,
        now: Millis,
        bus: &mut impl Publisher,
    ) {
        let Some(filter) = self
            .filters
            .iter_mut()
            .find_map(|(c, f)| (*c == channel).then_some(f))
        else {
            return;
        };
        if let Some(mean) = filter.offer(value, now) {
            if let Some(entry) = self.last_values.iter_mut().find(|(c, _)| *c == channel) {
                entry.1 = mean;
            } else {
                let _ = self.last_values.push((channel, mean));
            }
            let topic = topic::value_topic(self.config.name.as_str(), channel);
            bus.publish(&topic, &topic::format_value(mean, channel.decimals()));
        }
    }

    fn republish_cached(&mut self, channel: Channel, bus: &mut impl Publisher) {
        if let Some((_, value)) = self.last_values.iter().find(|(c, _)| *c == channel) {
            let topic = topic::value_topic(self.config.name.as_str(), channel);
            bus.publish(&topic, &topic::format_value(*value, channel.decimals()));
        }
    }

    fn publish_mode(&mut self, bus: &mut impl Publisher) {
        let topic = topic::value_topic(self.config.name.as_str(), Channel::Mode);
        bus.publish(&topic, self.config.mode.as_str());
    }

    fn publish_error(&mut self, args: fmt::Arguments<'_>, bus: &mut impl Publisher) {
        let topic = topic::value_topic(self.config.name.as_str(), Channel::Error);
        bus.publish(&topic, &topic::format_payload(args));
    }

    fn meta_topic(&self, leaf: &str) -> TopicString {
        let mut topic = TopicString::new();
        let mut push = |s: &str| {
            for c in s.chars() {
                if topic.push(c).is_err() {
                    break;
                }
            }
        };
        push(self.config.name.as_str());
        push(topic::TOPIC_INFIX);
        push(leaf);
        topic
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bus::MessageLog;
    use crate::errors::TransportError;
    use crate::time::FixedClock;

    #[derive(Default)]
    struct StubLogic {
        begin_fail: Option<SensorError>,
        ready_blocks: u8,
        value: f32,
        begins: usize,
        reads: usize,
    }

    impl SensorLogic for StubLogic {
        fn channels(&self) -> &'static [Channel] {
            &[Channel::Temperature]
        }

        fn begin(&mut self) -> SensorResult<()> {
            self.begins += 1;
            match self.begin_fail {
                Some(err) => Err(err),
                None => Ok(()),
            }
        }

        fn start_measurement(&mut self, _now: Micros) -> nb::Result<(), SensorError> {
            Ok(())
        }

        fn data_ready(&mut self, _waited_ms: u32) -> nb::Result<(), SensorError> {
            if self.ready_blocks > 0 {
                self.ready_blocks -= 1;
                return Err(nb::Error::WouldBlock);
            }
            Ok(())
        }

        fn read_values(&mut self, _now: Millis, out: &mut Readings) -> SensorResult<()> {
            self.reads += 1;
            let _ = out.push(Reading {
                channel: Channel::Temperature,
                value: self.value,
            });
            Ok(())
        }
    }

    fn fast_config(name: &str) -> SensorConfig {
        SensorConfig::new(name)
            .with_poll_rate_ms(1_000)
            .with_mode(FilterMode::Fast)
    }

    #[test]
    fn one_phase_transition_per_tick() {
        let logic = StubLogic {
            value: 21.5,
            ..Default::default()
        };
        let mut runtime = SensorRuntime::new(logic, fast_config("lab"));
        let mut clock = FixedClock::new();
        let mut log: MessageLog = MessageLog::new();

        assert_eq!(runtime.phase(), Phase::Unavailable);
        runtime.begin(&clock, &mut log);
        assert_eq!(runtime.phase(), Phase::Idle);

        let expected = [
            Phase::MeasurementStart,
            Phase::MeasurementWait,
            Phase::DataRead,
            Phase::WaitNextMeasurement,
        ];
        for want in expected {
            clock.advance_millis(50);
            runtime.tick(&clock, &mut log);
            assert_eq!(runtime.phase(), want);
        }
        assert_eq!(log.last_on("lab/sensor/temperature"), Some("21.50"));
    }

    #[test]
    fn nothing_is_published_before_begin() {
        let mut runtime = SensorRuntime::new(StubLogic::default(), fast_config("lab"));
        let clock = FixedClock::new();
        let mut log: MessageLog = MessageLog::new();
        for _ in 0..20 {
            runtime.tick(&clock, &mut log);
        }
        assert!(log.is_empty());
        assert_eq!(runtime.logic().reads, 0);
    }

    #[test]
    fn wrong_chip_locks_the_sensor_out() {
        let logic = StubLogic {
            begin_fail: Some(SensorError::Transport(
                TransportError::WrongHardwareAtAddress {
                    address: 0x76,
                    expected: 0x60,
                    found: 0x58,
                },
            )),
            ..Default::default()
        };
        let mut runtime = SensorRuntime::new(logic, fast_config("tph"));
        let mut clock = FixedClock::new();
        let mut log: MessageLog = MessageLog::new();

        runtime.begin(&clock, &mut log);
        assert_eq!(runtime.phase(), Phase::Unavailable);
        let error = log.last_on("tph/sensor/error").unwrap();
        assert!(error.contains("0x58"));
        assert!(error.contains("0x60"));

        // Ticks never wake it up again.
        for _ in 0..100 {
            clock.advance_millis(50);
            runtime.tick(&clock, &mut log);
        }
        assert_eq!(runtime.phase(), Phase::Unavailable);
        assert_eq!(runtime.logic().reads, 0);
    }

    #[test]
    fn conversion_timeout_drops_the_cycle() {
        let logic = StubLogic {
            ready_blocks: u8::MAX,
            value: 1.0,
            ..Default::default()
        };
        let mut runtime = SensorRuntime::new(logic, fast_config("slow"));
        let mut clock = FixedClock::new();
        let mut log: MessageLog = MessageLog::new();

        runtime.begin(&clock, &mut log);
        clock.advance_millis(50);
        runtime.tick(&clock, &mut log); // -> MeasurementStart
        clock.advance_millis(50);
        runtime.tick(&clock, &mut log); // -> MeasurementWait

        // Poll past the default conversion deadline.
        for _ in 0..50 {
            clock.advance_millis(50);
            runtime.tick(&clock, &mut log);
            if runtime.phase() != Phase::MeasurementWait {
                break;
            }
        }
        assert_eq!(runtime.phase(), Phase::WaitNextMeasurement);
        let error = log.last_on("slow/sensor/error").unwrap();
        assert!(error.contains("timeout"));
        assert_eq!(log.count_on("slow/sensor/temperature"), 0);
    }

    #[test]
    fn cached_get_republishes_identical_bytes() {
        let logic = StubLogic {
            value: 21.5,
            ..Default::default()
        };
        let mut runtime = SensorRuntime::new(logic, fast_config("lab"));
        let mut clock = FixedClock::new();
        let mut log: MessageLog = MessageLog::new();

        runtime.begin(&clock, &mut log);
        for _ in 0..4 {
            clock.advance_millis(50);
            runtime.tick(&clock, &mut log);
        }
        let published = log.last_on("lab/sensor/temperature").unwrap().to_string();
        let reads_before = runtime.logic().reads;

        log.clear();
        let consumed =
            runtime.handle_message("lab/sensor/temperature/get", "", &clock, &mut log);
        assert!(consumed);
        assert_eq!(log.last_on("lab/sensor/temperature"), Some(published.as_str()));
        // Served from cache: no new acquisition happened.
        assert_eq!(runtime.logic().reads, reads_before);
    }

    #[test]
    fn mode_commands_announce_and_reconfigure() {
        let logic = StubLogic {
            value: 20.0,
            ..Default::default()
        };
        let mut runtime = SensorRuntime::new(logic, fast_config("lab"));
        let mut clock = FixedClock::new();
        let mut log: MessageLog = MessageLog::new();
        runtime.begin(&clock, &mut log);

        assert!(runtime.handle_message("lab/sensor/mode/get", "", &clock, &mut log));
        assert_eq!(log.last_on("lab/sensor/mode"), Some("FAST"));

        assert!(runtime.handle_message("lab/sensor/mode/set", "longterm", &clock, &mut log));
        assert_eq!(log.last_on("lab/sensor/mode"), Some("LONGTERM"));
        assert_eq!(runtime.mode(), FilterMode::Longterm);

        assert!(runtime.handle_message("lab/sensor/mode/set", "turbo", &clock, &mut log));
        assert!(log.last_on("lab/sensor/error").unwrap().contains("turbo"));

        // Other sensors' topics are left alone.
        assert!(!runtime.handle_message("other/sensor/mode/set", "FAST", &clock, &mut log));
    }

    #[test]
    fn subscription_pattern_covers_the_prefix() {
        let runtime = SensorRuntime::new(StubLogic::default(), fast_config("lab"));
        let pattern = runtime.subscription_pattern();
        assert_eq!(pattern.as_str(), "lab/sensor/#");
        assert!(crate::topic::topic_matches(&pattern, "lab/sensor/mode/set"));
    }
}
