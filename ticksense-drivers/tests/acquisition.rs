//! End-to-end acquisition: real drivers under [`SensorRuntime`], mocked at
//! the wire. The register-bus path runs a TPH chip over an I²C mock and
//! checks the payloads leaving on the value topics; the pulse path runs the
//! power meter off edge slots fed the way the interrupt trampoline feeds
//! them in firmware.

use embedded_hal_mock::eh1::digital::{
    Mock as PinMock, State as PinState, Transaction as PinTransaction,
};
use embedded_hal_mock::eh1::i2c::{Mock as I2cMock, Transaction as I2cTransaction};

use ticksense_core::bus::MessageLog;
use ticksense_core::pulse::freq;
use ticksense_core::slot::{EdgeSlot, EdgeSlots};
use ticksense_core::time::FixedClock;
use ticksense_core::{FilterMode, Micros, Phase, SensorConfig, SensorRuntime};
use ticksense_drivers::{Baro, PowerMeter, PowerScale};

const ADDR: u8 = 0x76;

// The chip's register map, as seen on the bus.
const REG_ID: u8 = 0xd0;
const REG_CTRL_HUM: u8 = 0xf2;
const REG_STATUS: u8 = 0xf3;
const REG_CTRL_MEAS: u8 = 0xf4;
const REG_CONFIG: u8 = 0xf5;
const REG_DATA: u8 = 0xf7;
const REG_CALIB_TP: u8 = 0x88;
const REG_CALIB_H: u8 = 0xe1;
const CHIP_ID_TPH: u8 = 0x60;
const CHIP_ID_PT: u8 = 0x58;
const CTRL_MEAS_FORCED: u8 = 0x25;
const STATUS_MEASURING: u8 = 0x08;

/// Trim with T2, P1 and H2 alone set, so the compensated values come out
/// as round numbers (12.80 °C, 1000.00 hPa, 0.50 %).
fn calib_tp_bytes() -> Vec<u8> {
    let mut buf = vec![0u8; 26];
    buf[2..4].copy_from_slice(&2_048i16.to_le_bytes());
    buf[6..8].copy_from_slice(&32_768u16.to_le_bytes());
    buf
}

fn calib_h_bytes() -> Vec<u8> {
    let mut buf = vec![0u8; 7];
    buf[0..2].copy_from_slice(&1i16.to_le_bytes());
    buf
}

fn begin_transactions() -> Vec<I2cTransaction> {
    vec![
        I2cTransaction::write(ADDR, vec![]),
        I2cTransaction::write_read(ADDR, vec![REG_ID], vec![CHIP_ID_TPH]),
        I2cTransaction::write_read(ADDR, vec![REG_CALIB_TP], calib_tp_bytes()),
        I2cTransaction::write_read(ADDR, vec![REG_CALIB_H], calib_h_bytes()),
        I2cTransaction::write(ADDR, vec![REG_CONFIG, 0x00]),
        I2cTransaction::write_read(ADDR, vec![REG_CONFIG], vec![0x00]),
        I2cTransaction::write(ADDR, vec![REG_CTRL_HUM, 0x01]),
    ]
}

/// One forced conversion as the runtime paces it: the start write, one
/// busy status poll, one idle poll, the burst read.
fn conversion_transactions(adc_p_20bit: u32) -> Vec<I2cTransaction> {
    let data = vec![
        (adc_p_20bit >> 12) as u8,
        (adc_p_20bit >> 4) as u8,
        ((adc_p_20bit & 0xf) << 4) as u8,
        0x80,
        0x00,
        0x00,
        0x80,
        0x00,
    ];
    vec![
        I2cTransaction::write(ADDR, vec![REG_CTRL_MEAS, CTRL_MEAS_FORCED]),
        I2cTransaction::write_read(ADDR, vec![REG_STATUS], vec![STATUS_MEASURING]),
        I2cTransaction::write_read(ADDR, vec![REG_STATUS], vec![0x00]),
        I2cTransaction::write_read(ADDR, vec![REG_DATA], data),
    ]
}

fn run_ticks<L: ticksense_core::SensorLogic>(
    runtime: &mut SensorRuntime<L>,
    clock: &mut FixedClock,
    log: &mut MessageLog,
    ticks: usize,
) {
    for _ in 0..ticks {
        clock.advance_millis(50);
        runtime.tick(clock, log);
    }
}

fn feed_edges(slot: &EdgeSlot, count: u32, start_us: u32, spacing_us: u32) {
    // First edge opens the window, `count` more are counted.
    for i in 0..=count {
        freq::isr_edge(slot, Micros(start_us + i * spacing_us));
    }
}

#[test]
fn tph_cycles_publish_on_the_value_topics() {
    let mut transactions = begin_transactions();
    transactions.extend(conversion_transactions(524_288)); // 1000.00 hPa
    transactions.extend(conversion_transactions(521_667)); // ~1005.03 hPa
    let mut i2c = I2cMock::new(&transactions);

    let baro = Baro::new_tph(i2c.clone(), ADDR);
    let config = SensorConfig::new("outdoor")
        .with_poll_rate_ms(200)
        .with_mode(FilterMode::Fast);
    let mut runtime = SensorRuntime::new(baro, config);
    let mut clock = FixedClock::new();
    let mut log: MessageLog = MessageLog::new();

    runtime.begin(&clock, &mut log);
    assert_eq!(runtime.phase(), Phase::Idle);
    assert_eq!(log.count_on("outdoor/sensor/error"), 0);

    // Five 50 ms ticks walk one complete cycle: due, start, busy poll,
    // ready, read-and-publish.
    run_ticks(&mut runtime, &mut clock, &mut log, 5);
    assert_eq!(runtime.phase(), Phase::WaitNextMeasurement);
    assert_eq!(log.last_on("outdoor/sensor/temperature"), Some("12.80"));
    assert_eq!(log.last_on("outdoor/sensor/humidity"), Some("0.50"));
    assert_eq!(log.last_on("outdoor/sensor/pressure"), Some("1000.00"));
    // No reference altitude configured: the sea-level value is the station
    // value, byte for byte.
    assert_eq!(
        log.last_on("outdoor/sensor/pressureNN"),
        log.last_on("outdoor/sensor/pressure")
    );

    // Second cycle: pressure moved ~5 hPa, temperature and humidity did
    // not. The deadband lets only the pressure channels through.
    run_ticks(&mut runtime, &mut clock, &mut log, 6);
    let pressure: f32 = log
        .last_on("outdoor/sensor/pressure")
        .unwrap()
        .parse()
        .unwrap();
    assert!((pressure - 1_005.03).abs() < 0.1, "pressure = {pressure}");
    assert_eq!(log.count_on("outdoor/sensor/pressure"), 2);
    assert_eq!(log.count_on("outdoor/sensor/temperature"), 1);
    assert_eq!(log.count_on("outdoor/sensor/humidity"), 1);

    i2c.done();
}

#[test]
fn wrong_chip_parks_the_runtime_and_stops_all_traffic() {
    let mut i2c = I2cMock::new(&[
        I2cTransaction::write(ADDR, vec![]),
        I2cTransaction::write_read(ADDR, vec![REG_ID], vec![CHIP_ID_PT]),
    ]);

    let baro = Baro::new_tph(i2c.clone(), ADDR);
    let mut runtime = SensorRuntime::new(baro, SensorConfig::new("probe"));
    let mut clock = FixedClock::new();
    let mut log: MessageLog = MessageLog::new();

    runtime.begin(&clock, &mut log);
    assert_eq!(runtime.phase(), Phase::Unavailable);
    let error = log.last_on("probe/sensor/error").unwrap();
    assert!(error.contains("0x58"));
    assert!(error.contains("0x60"));

    // Parked means parked: further ticks touch neither the bus nor the
    // message log. An unexpected transaction would trip the mock here.
    run_ticks(&mut runtime, &mut clock, &mut log, 20);
    assert_eq!(runtime.phase(), Phase::Unavailable);
    assert_eq!(log.len(), 1);

    i2c.done();
}

#[test]
fn power_meter_alternates_quantities_through_the_runtime() {
    let slots = EdgeSlots::<2>::new();
    let mut pin = PinMock::new(&[
        PinTransaction::set(PinState::High), // begin: voltage first
        PinTransaction::set(PinState::Low),  // after cycle 1: current
        PinTransaction::set(PinState::High), // after cycle 2: voltage
    ]);

    let meter = PowerMeter::new(
        slots.claim(0).unwrap(),
        slots.claim(1).unwrap(),
        pin.clone(),
        PowerScale::default(),
    );
    let config = SensorConfig::new("mains")
        .with_poll_rate_ms(200)
        .with_mode(FilterMode::Fast);
    let mut runtime = SensorRuntime::new(meter, config);
    let mut clock = FixedClock::new();
    let mut log: MessageLog = MessageLog::new();

    runtime.begin(&clock, &mut log);

    // Edges arrive from interrupt context while the runtime paces itself;
    // the test plays the trampoline through the bank, not the driver.
    feed_edges(slots.get(0).unwrap(), 400, 0, 5_000); // 100 Hz -> 50 W
    feed_edges(slots.get(1).unwrap(), 50, 0, 4_000); // 125 Hz -> 250 V
    run_ticks(&mut runtime, &mut clock, &mut log, 5);
    assert_eq!(log.last_on("mains/sensor/power"), Some("50.0"));
    assert_eq!(log.last_on("mains/sensor/voltage"), Some("250.0"));
    assert_eq!(log.count_on("mains/sensor/current"), 0);

    // The mux accumulated under current selection; the power output went
    // silent, so only the current is published this cycle.
    feed_edges(slots.get(1).unwrap(), 30, 3_000_000, 10_000); // 50 Hz -> 5 A
    run_ticks(&mut runtime, &mut clock, &mut log, 6);
    assert_eq!(log.last_on("mains/sensor/current"), Some("5.000"));
    assert_eq!(log.count_on("mains/sensor/power"), 1);
    assert_eq!(log.count_on("mains/sensor/voltage"), 1);

    pin.done();
}
