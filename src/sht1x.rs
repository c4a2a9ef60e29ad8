//! Driver for the SHT1x temperature and relative humidity sensor.
//!
//! The device speaks a proprietary two-wire protocol (data + clock), not
//! I2C: commands start with a fixed transmission-start edge pattern, every
//! byte is acknowledged on a ninth clock pulse, and all timing comes from
//! fixed-duration delays driven by the host.
//!
//! [`Sht1x::update`] runs both measurements and caches the calibrated pair;
//! the getters, including the derived dew point, serve the cache without
//! touching the bus. With the `crc` feature enabled the checksum byte of
//! each measurement is verified; a mismatch is recorded but the reading is
//! still used.

use byteorder::{BigEndian, ByteOrder};
use core::fmt::Debug;
use embedded_hal::delay::DelayNs;
use embedded_hal::digital::OutputPin;

use crate::{Error, IoWire, OpCode};

// Coefficients for the 12-bit humidity / 14-bit temperature readout at 5V.
const C1: f32 = -2.0468;
const C2: f32 = 0.0367;
const C3: f32 = -0.000_001_595_5;
const T1: f32 = 0.01;
const T2: f32 = 0.000_08;

#[derive(Clone, Copy, Debug)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[repr(u8)]
pub enum Command {
    ReadTemperature = 0x03,
    ReadRelHumidity = 0x05,
    WriteStatus = 0x06,
    ReadStatus = 0x07,
    SoftReset = 0x1E,
}

impl OpCode for Command {
    fn op_code(&self) -> u8 {
        *self as _
    }
}

/// Acknowledgment level driven after a received byte.
#[derive(Clone, Copy, Debug)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Ack {
    /// Pull data low: more bytes follow.
    More,
    /// Leave data high: this was the last byte.
    Last,
}

pub struct Sht1x<D, C> {
    data: D,
    sck: C,
    temperature: f32,
    humidity: f32,
    #[cfg(feature = "crc")]
    crc: Crc8,
    #[cfg(feature = "crc")]
    crc_error: bool,
}

impl<E, D, C> Sht1x<D, C>
where
    E: Debug,
    D: IoWire<Error = E>,
    C: OutputPin<Error = E>,
{
    /// Takes ownership of the data and clock lines.
    ///
    /// Both cached readings start at the sentinel `0.0`; call
    /// [`Sht1x::connection_reset`] to bind and [`Sht1x::update`] before
    /// trusting any getter.
    pub fn new(data: D, sck: C) -> Self {
        Sht1x {
            data,
            sck,
            temperature: 0.0,
            humidity: 0.0,
            #[cfg(feature = "crc")]
            crc: Crc8::default(),
            #[cfg(feature = "crc")]
            crc_error: false,
        }
    }

    /// One clock pulse with a generous hold time.
    fn strobe(&mut self, delay: &mut impl DelayNs) -> Result<(), E> {
        self.sck.set_high()?;
        delay.delay_ms(1);
        self.sck.set_low()?;
        Ok(())
    }

    /// Resynchronizes the device to a command boundary.
    ///
    /// Holds data high while clocking nine times, then runs the start
    /// sequence. Safe to call after any failed transaction.
    pub fn connection_reset(&mut self, delay: &mut impl DelayNs) -> Result<(), E> {
        self.data.set_high()?;
        self.sck.set_low()?;
        for _ in 0..9 {
            self.strobe(delay)?;
        }
        self.start_sequence()
    }

    /// The transmission-start pattern: data falls while the clock is high,
    /// then rises again during the next clock pulse.
    pub fn start_sequence(&mut self) -> Result<(), E> {
        self.data.set_high()?;
        self.sck.set_low()?;
        self.sck.set_high()?;
        self.data.set_low()?;
        self.sck.set_low()?;
        self.sck.set_high()?;
        self.data.set_high()?;
        self.sck.set_low()?;
        Ok(())
    }

    /// Resets the device interface and settings.
    pub fn soft_reset(&mut self, delay: &mut impl DelayNs) -> Result<(), Error<E>> {
        self.connection_reset(delay)?;
        self.send_byte(delay, Command::SoftReset.op_code())?;
        // 11ms minimum before the next command.
        delay.delay_ms(15);
        Ok(())
    }

    /// Sends one byte MSB first and samples the acknowledgment bit.
    pub fn send_byte(&mut self, delay: &mut impl DelayNs, value: u8) -> Result<(), Error<E>> {
        for i in 0..8 {
            if value & (0x80 >> i) != 0 {
                self.data.set_high()?;
            } else {
                self.data.set_low()?;
            }
            self.strobe(delay)?;
        }

        // Release the line; the device pulls it low on the ninth clock.
        self.data.set_high()?;
        self.sck.set_high()?;
        let acked = self.data.is_low()?;
        self.sck.set_low()?;
        if acked {
            Ok(())
        } else {
            Err(Error::NoAck)
        }
    }

    /// Receives one byte MSB first, then drives the acknowledgment level.
    pub fn receive_byte(&mut self, delay: &mut impl DelayNs, ack: Ack) -> Result<u8, E> {
        let mut value = 0;
        for i in 0..8 {
            self.sck.set_high()?;
            if self.data.is_high()? {
                value |= 0x80 >> i;
            }
            self.sck.set_low()?;
        }

        match ack {
            Ack::More => self.data.set_low()?,
            Ack::Last => self.data.set_high()?,
        }
        self.strobe(delay)?;
        self.data.set_high()?;
        Ok(value)
    }

    pub fn status_register_read(&mut self, delay: &mut impl DelayNs) -> Result<u8, Error<E>> {
        self.start_sequence()?;
        self.send_byte(delay, Command::ReadStatus.op_code())?;
        let status = self.receive_byte(delay, Ack::More)?;
        let _checksum = self.receive_byte(delay, Ack::Last)?;
        Ok(status)
    }

    pub fn status_register_write(
        &mut self,
        delay: &mut impl DelayNs,
        value: u8,
    ) -> Result<(), Error<E>> {
        self.start_sequence()?;
        self.send_byte(delay, Command::WriteStatus.op_code())?;
        self.send_byte(delay, value)
    }

    /// Waits for the device to pull data low, signaling conversion complete.
    ///
    /// There is no timeout: an unresponsive device blocks the caller
    /// indefinitely.
    fn wait_for_measurement(&mut self) -> Result<(), E> {
        while self.data.is_high()? {}
        Ok(())
    }

    fn measure(&mut self, delay: &mut impl DelayNs, command: Command) -> Result<u16, Error<E>> {
        self.start_sequence()?;
        self.send_byte(delay, command.op_code())?;
        #[cfg(feature = "crc")]
        {
            self.crc.reset();
            self.crc.update(command.op_code());
        }

        self.wait_for_measurement()?;
        let high = self.receive_byte(delay, Ack::More)?;
        let low = self.receive_byte(delay, Ack::More)?;
        let checksum = self.receive_byte(delay, Ack::Last)?;
        #[cfg(feature = "crc")]
        {
            self.crc.update(high);
            self.crc.update(low);
            // The device transmits the checksum bit-reversed relative to data.
            let computed = self.crc.get().reverse_bits();
            if computed != checksum {
                // Sticky across the update: a later clean frame must not
                // erase the record of an earlier mismatch.
                self.crc_error = true;
                #[cfg(feature = "defmt")]
                defmt::warn!(
                    "checksum mismatch: computed {=u8:#x}, received {=u8:#x}",
                    computed,
                    checksum
                );
            }
        }
        #[cfg(not(feature = "crc"))]
        let _ = checksum;

        Ok(BigEndian::read_u16(&[high, low]))
    }

    /// Measures temperature and humidity and refreshes the cached pair.
    ///
    /// An unacknowledged command aborts the whole update and leaves the
    /// previously cached readings untouched.
    pub fn update(&mut self, delay: &mut impl DelayNs) -> Result<(), Error<E>> {
        #[cfg(feature = "crc")]
        {
            self.crc_error = false;
        }
        let raw_temperature = self.measure(delay, Command::ReadTemperature)?;
        let raw_humidity = self.measure(delay, Command::ReadRelHumidity)?;

        let temperature = convert_temperature(raw_temperature);
        self.temperature = temperature;
        self.humidity = convert_humidity(raw_humidity, temperature);
        Ok(())
    }

    /// Last measured temperature in degrees Celsius (`0.0` before the first
    /// successful update).
    pub fn temperature(&self) -> f32 {
        self.temperature
    }

    /// Last measured relative humidity in %RH, clamped to [0.1, 100]
    /// (`0.0` before the first successful update).
    pub fn humidity(&self) -> f32 {
        self.humidity
    }

    /// Dew point in degrees Celsius derived from the cached readings.
    ///
    /// Meaningless until the first successful update.
    pub fn dew_point(&self) -> f32 {
        dew_point_of(self.temperature, self.humidity)
    }

    /// Whether any measurement checksum in the last update failed to verify.
    ///
    /// The mismatched reading is used regardless; this flag is the only
    /// record of the failure. It is cleared at the start of the next update.
    #[cfg(feature = "crc")]
    pub fn crc_error(&self) -> bool {
        self.crc_error
    }

    pub fn release(self) -> (D, C) {
        (self.data, self.sck)
    }
}

/// 14-bit temperature code to degrees Celsius (5V supply assumed).
fn convert_temperature(raw: u16) -> f32 {
    raw as f32 * 0.01 - 40.1
}

/// 12-bit humidity code to temperature-compensated %RH.
fn convert_humidity(raw: u16, temperature: f32) -> f32 {
    let raw = raw as f32;
    let linear = C3 * raw * raw + C2 * raw + C1;
    let compensated = (temperature - 25.0) * (T1 + T2 * linear) + linear;
    compensated.clamp(0.1, 100.0)
}

fn dew_point_of(temperature: f32, humidity: f32) -> f32 {
    let k = (libm::log10f(humidity) - 2.0) / 0.4343
        + (17.62 * temperature) / (243.12 + temperature);
    243.12 * k / (17.62 - k)
}

#[cfg(feature = "crc")]
#[derive(Default)]
struct Crc8 {
    state: u8,
}

#[cfg(feature = "crc")]
impl Crc8 {
    fn reset(&mut self) {
        self.state = 0;
    }

    fn update(&mut self, value: u8) {
        self.state = CRC_TABLE[(value ^ self.state) as usize];
    }

    fn get(&self) -> u8 {
        self.state
    }
}

/// CRC-8 table for polynomial 0x31, as published in the Sensirion CRC
/// application note. Distinct from the PEC table in [`crate::mlx90614`];
/// the two must never be merged.
#[cfg(feature = "crc")]
const CRC_TABLE: [u8; 256] = [
    0x00, 0x31, 0x62, 0x53, 0xc4, 0xf5, 0xa6, 0x97,
    0xb9, 0x88, 0xdb, 0xea, 0x7d, 0x4c, 0x1f, 0x2e,
    0x43, 0x72, 0x21, 0x10, 0x87, 0xb6, 0xe5, 0xd4,
    0xfa, 0xcb, 0x98, 0xa9, 0x3e, 0x0f, 0x5c, 0x6d,
    0x86, 0xb7, 0xe4, 0xd5, 0x42, 0x73, 0x20, 0x11,
    0x3f, 0x0e, 0x5d, 0x6c, 0xfb, 0xca, 0x99, 0xa8,
    0xc5, 0xf4, 0xa7, 0x96, 0x01, 0x30, 0x63, 0x52,
    0x7c, 0x4d, 0x1e, 0x2f, 0xb8, 0x89, 0xda, 0xeb,
    0x3d, 0x0c, 0x5f, 0x6e, 0xf9, 0xc8, 0x9b, 0xaa,
    0x84, 0xb5, 0xe6, 0xd7, 0x40, 0x71, 0x22, 0x13,
    0x7e, 0x4f, 0x1c, 0x2d, 0xba, 0x8b, 0xd8, 0xe9,
    0xc7, 0xf6, 0xa5, 0x94, 0x03, 0x32, 0x61, 0x50,
    0xbb, 0x8a, 0xd9, 0xe8, 0x7f, 0x4e, 0x1d, 0x2c,
    0x02, 0x33, 0x60, 0x51, 0xc6, 0xf7, 0xa4, 0x95,
    0xf8, 0xc9, 0x9a, 0xab, 0x3c, 0x0d, 0x5e, 0x6f,
    0x41, 0x70, 0x23, 0x12, 0x85, 0xb4, 0xe7, 0xd6,
    0x7a, 0x4b, 0x18, 0x29, 0xbe, 0x8f, 0xdc, 0xed,
    0xc3, 0xf2, 0xa1, 0x90, 0x07, 0x36, 0x65, 0x54,
    0x39, 0x08, 0x5b, 0x6a, 0xfd, 0xcc, 0x9f, 0xae,
    0x80, 0xb1, 0xe2, 0xd3, 0x44, 0x75, 0x26, 0x17,
    0xfc, 0xcd, 0x9e, 0xaf, 0x38, 0x09, 0x5a, 0x6b,
    0x45, 0x74, 0x27, 0x16, 0x81, 0xb0, 0xe3, 0xd2,
    0xbf, 0x8e, 0xdd, 0xec, 0x7b, 0x4a, 0x19, 0x28,
    0x06, 0x37, 0x64, 0x55, 0xc2, 0xf3, 0xa0, 0x91,
    0x47, 0x76, 0x25, 0x14, 0x83, 0xb2, 0xe1, 0xd0,
    0xfe, 0xcf, 0x9c, 0xad, 0x3a, 0x0b, 0x58, 0x69,
    0x04, 0x35, 0x66, 0x57, 0xc0, 0xf1, 0xa2, 0x93,
    0xbd, 0x8c, 0xdf, 0xee, 0x79, 0x48, 0x1b, 0x2a,
    0xc1, 0xf0, 0xa3, 0x92, 0x05, 0x34, 0x67, 0x56,
    0x78, 0x49, 0x1a, 0x2b, 0xbc, 0x8d, 0xde, 0xef,
    0x82, 0xb3, 0xe0, 0xd1, 0x46, 0x77, 0x24, 0x15,
    0x3b, 0x0a, 0x59, 0x68, 0xff, 0xce, 0x9d, 0xac,
];
