//! Channels, Topics and Payload Formatting
//!
//! Every value a sensor produces is published on a topic of the form
//! `<sensor>/sensor/<channel>`, with the value rendered as a plain decimal
//! string at a per-channel precision. Commands arrive on the same prefix
//! (`mode/set`, `temperature/get`, ...), so subscribers typically register
//! the wildcard pattern `<sensor>/sensor/#`.
//!
//! [`Channel`] is the closed set of value channels the drivers in this
//! workspace publish. The wire name and the rendered precision both live
//! here so that a value re-published from cache (`<channel>/get`) is
//! byte-identical to the original publication.
//!
//! All strings are fixed-capacity `heapless` types. Assembly truncates at
//! capacity instead of failing; capacities are sized so that truncation
//! cannot occur for names within [`SENSOR_NAME_CAPACITY`].

use core::fmt::{self, Write};

use heapless::String;

/// Maximum length of a sensor instance name.
pub const SENSOR_NAME_CAPACITY: usize = 24;

/// Capacity of an assembled topic string.
pub const TOPIC_CAPACITY: usize = 64;

/// Capacity of a rendered value or error payload.
pub const PAYLOAD_CAPACITY: usize = 96;

/// Capacity of a calibration dump payload.
pub const CAL_DUMP_CAPACITY: usize = 256;

/// Sensor instance name, e.g. `"outdoor"`.
pub type SensorName = String<SENSOR_NAME_CAPACITY>;

/// Assembled topic.
pub type TopicString = String<TOPIC_CAPACITY>;

/// Rendered payload.
pub type PayloadString = String<PAYLOAD_CAPACITY>;

/// Rendered calibration dump.
pub type CalDump = String<CAL_DUMP_CAPACITY>;

/// Path segment between the sensor name and the channel name.
pub const TOPIC_INFIX: &str = "/sensor/";

/// Value channels published by the drivers in this workspace.
///
/// `Mode` and `Error` are status channels: they carry text payloads and
/// their `decimals()` is zero by convention.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Channel {
    /// Air or medium temperature, °C.
    Temperature,
    /// Station pressure as measured, hPa.
    Pressure,
    /// Pressure reduced to sea level, hPa.
    PressureNn,
    /// Relative humidity, %.
    Humidity,
    /// Illuminance, lx.
    Illuminance,
    /// Illuminance normalized to [0, 1].
    UnitIlluminance,
    /// Equivalent CO₂ estimate, ppm.
    Co2,
    /// Total volatile organic compounds, ppb.
    Voc,
    /// Gamma dose rate averaged over the last ten minutes, µSv/h.
    Gamma10MinAvg,
    /// Magnetic field, x axis, µT.
    MagneticFieldX,
    /// Magnetic field, y axis, µT.
    MagneticFieldY,
    /// Magnetic field, z axis, µT.
    MagneticFieldZ,
    /// Magnetic field vector magnitude, µT.
    MagneticFieldStrength,
    /// Mains or probe voltage, V.
    Voltage,
    /// Current, A.
    Current,
    /// Active power, W.
    Power,
    /// Generic analog reading normalized to [0, 1].
    UnitAnalogSensor,
    /// Rain sensor wetness normalized to [0, 1].
    UnitRain,
    /// Altitude relative to a commanded zero point, m.
    RelativeAltitude,
    /// Altitude change since the previous sample, m.
    DeltaAltitude,
    /// Active filter mode (text payload).
    Mode,
    /// Error reports (text payload).
    Error,
}

impl Channel {
    /// Wire name used in topics.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Temperature => "temperature",
            Self::Pressure => "pressure",
            Self::PressureNn => "pressureNN",
            Self::Humidity => "humidity",
            Self::Illuminance => "illuminance",
            Self::UnitIlluminance => "unitilluminance",
            Self::Co2 => "co2",
            Self::Voc => "voc",
            Self::Gamma10MinAvg => "gamma10minavg",
            Self::MagneticFieldX => "magnetic_field_x",
            Self::MagneticFieldY => "magnetic_field_y",
            Self::MagneticFieldZ => "magnetic_field_z",
            Self::MagneticFieldStrength => "magnetic_field_strength",
            Self::Voltage => "voltage",
            Self::Current => "current",
            Self::Power => "power",
            Self::UnitAnalogSensor => "unitanalogsensor",
            Self::UnitRain => "unitrain",
            Self::RelativeAltitude => "relativealtitude",
            Self::DeltaAltitude => "deltaaltitude",
            Self::Mode => "mode",
            Self::Error => "error",
        }
    }

    /// Decimal places used when rendering values for this channel.
    pub fn decimals(&self) -> u8 {
        match self {
            Self::Temperature | Self::Pressure | Self::PressureNn | Self::Humidity => 2,
            Self::Illuminance | Self::Voltage | Self::Power => 1,
            Self::UnitIlluminance | Self::UnitAnalogSensor | Self::UnitRain => 3,
            Self::Co2 | Self::Voc => 1,
            Self::Gamma10MinAvg => 3,
            Self::MagneticFieldX
            | Self::MagneticFieldY
            | Self::MagneticFieldZ
            | Self::MagneticFieldStrength => 2,
            Self::Current => 3,
            Self::RelativeAltitude | Self::DeltaAltitude => 1,
            Self::Mode | Self::Error => 0,
        }
    }

    /// Unit suffix for display purposes.
    pub fn unit(&self) -> &'static str {
        match self {
            Self::Temperature => "°C",
            Self::Pressure | Self::PressureNn => "hPa",
            Self::Humidity => "%",
            Self::Illuminance => "lx",
            Self::Co2 => "ppm",
            Self::Voc => "ppb",
            Self::Gamma10MinAvg => "µSv/h",
            Self::MagneticFieldX
            | Self::MagneticFieldY
            | Self::MagneticFieldZ
            | Self::MagneticFieldStrength => "µT",
            Self::Voltage => "V",
            Self::Current => "A",
            Self::Power => "W",
            Self::RelativeAltitude | Self::DeltaAltitude => "m",
            Self::UnitIlluminance
            | Self::UnitAnalogSensor
            | Self::UnitRain
            | Self::Mode
            | Self::Error => "",
        }
    }

    /// Reverse lookup from a wire name.
    pub fn from_name(name: &str) -> Option<Self> {
        const ALL: &[Channel] = &[
            Channel::Temperature,
            Channel::Pressure,
            Channel::PressureNn,
            Channel::Humidity,
            Channel::Illuminance,
            Channel::UnitIlluminance,
            Channel::Co2,
            Channel::Voc,
            Channel::Gamma10MinAvg,
            Channel::MagneticFieldX,
            Channel::MagneticFieldY,
            Channel::MagneticFieldZ,
            Channel::MagneticFieldStrength,
            Channel::Voltage,
            Channel::Current,
            Channel::Power,
            Channel::UnitAnalogSensor,
            Channel::UnitRain,
            Channel::RelativeAltitude,
            Channel::DeltaAltitude,
            Channel::Mode,
            Channel::Error,
        ];
        ALL.iter().find(|c| c.name() == name).copied()
    }
}

/// Sink that swallows capacity overflow instead of propagating `fmt::Error`.
struct Truncating<'a, const N: usize>(&'a mut String<N>);

impl<const N: usize> Write for Truncating<'_, N> {
    fn write_str(&mut self, s: &str) -> fmt::Result {
        for c in s.chars() {
            if self.0.push(c).is_err() {
                break;
            }
        }
        Ok(())
    }
}

/// Assemble `<sensor>/sensor/<channel>`. Truncates at capacity.
pub fn value_topic(sensor: &str, channel: Channel) -> TopicString {
    let mut topic = TopicString::new();
    let _ = write!(Truncating(&mut topic), "{sensor}{TOPIC_INFIX}{}", channel.name());
    topic
}

/// Render a value at the given precision.
pub fn format_value(value: f32, decimals: u8) -> PayloadString {
    let mut payload = PayloadString::new();
    let _ = write!(Truncating(&mut payload), "{value:.prec$}", prec = decimals as usize);
    payload
}

/// Render arbitrary display arguments into a payload, truncating at capacity.
pub fn format_payload(args: fmt::Arguments<'_>) -> PayloadString {
    let mut payload = PayloadString::new();
    let _ = Truncating(&mut payload).write_fmt(args);
    payload
}

/// Extract the part after `<sensor>/sensor/` if the topic belongs to `sensor`.
///
/// Returns e.g. `"mode/set"` or `"temperature/get"`. Used for command
/// dispatch; topics addressed to other sensors return `None`.
pub fn parse_command<'t>(topic: &'t str, sensor: &str) -> Option<&'t str> {
    topic.strip_prefix(sensor)?.strip_prefix(TOPIC_INFIX)
}

/// Match a topic against a subscription pattern.
///
/// `+` matches exactly one path level, `#` matches the (possibly empty)
/// remainder. This is the usual wildcard grammar of topic-based buses.
pub fn topic_matches(pattern: &str, topic: &str) -> bool {
    let mut pattern_levels = pattern.split('/');
    let mut topic_levels = topic.split('/');
    loop {
        match (pattern_levels.next(), topic_levels.next()) {
            (Some("#"), _) => return true,
            (Some("+"), Some(_)) => {}
            (Some(want), Some(have)) if want == have => {}
            (None, None) => return true,
            _ => return false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn topics_follow_the_wire_format() {
        assert_eq!(
            value_topic("outdoor", Channel::Temperature).as_str(),
            "outdoor/sensor/temperature"
        );
        assert_eq!(
            value_topic("meter", Channel::PressureNn).as_str(),
            "meter/sensor/pressureNN"
        );
    }

    #[test]
    fn values_render_at_channel_precision() {
        assert_eq!(format_value(86.2, Channel::Humidity.decimals()).as_str(), "86.20");
        assert_eq!(format_value(37.8, Channel::Temperature.decimals()).as_str(), "37.80");
        assert_eq!(format_value(230.0, Channel::Voltage.decimals()).as_str(), "230.0");
        assert_eq!(format_value(0.104, Channel::Current.decimals()).as_str(), "0.104");
    }

    #[test]
    fn channel_names_round_trip() {
        for channel in [
            Channel::Temperature,
            Channel::PressureNn,
            Channel::Gamma10MinAvg,
            Channel::MagneticFieldStrength,
            Channel::UnitRain,
            Channel::Error,
        ] {
            assert_eq!(Channel::from_name(channel.name()), Some(channel));
        }
        assert_eq!(Channel::from_name("no_such_channel"), None);
    }

    #[test]
    fn command_parsing_requires_the_own_prefix() {
        assert_eq!(parse_command("outdoor/sensor/mode/set", "outdoor"), Some("mode/set"));
        assert_eq!(
            parse_command("outdoor/sensor/temperature/get", "outdoor"),
            Some("temperature/get")
        );
        assert_eq!(parse_command("indoor/sensor/mode/set", "outdoor"), None);
        assert_eq!(parse_command("outdoor/config/mode", "outdoor"), None);
    }

    #[test]
    fn wildcards_match_like_a_topic_bus() {
        assert!(topic_matches("outdoor/sensor/#", "outdoor/sensor/temperature"));
        assert!(topic_matches("outdoor/sensor/#", "outdoor/sensor/mode/set"));
        assert!(topic_matches("outdoor/sensor/#", "outdoor/sensor"));
        assert!(topic_matches("+/sensor/temperature", "any/sensor/temperature"));
        assert!(!topic_matches("+/sensor/temperature", "any/sensor/humidity"));
        assert!(!topic_matches("outdoor/sensor/+", "outdoor/sensor/mode/set"));
        assert!(topic_matches("#", "whatever/sensor/voc"));
    }

    #[test]
    fn long_names_truncate_instead_of_failing() {
        let name = "a-very-long-sensor-instance-name-way-over-capacity";
        let topic = value_topic(name, Channel::MagneticFieldStrength);
        assert_eq!(topic.len(), TOPIC_CAPACITY);
    }
}
