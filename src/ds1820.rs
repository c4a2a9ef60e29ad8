//! Driver for the DS1820 one-wire temperature sensor.
//!
//! The device hangs off a single data line. Every transaction starts with a
//! bus reset followed by a presence pulse from the device; bits are then
//! exchanged in fixed-duration time slots, least-significant bit first.

use byteorder::{ByteOrder, LittleEndian};
use core::fmt::Debug;
use embedded_hal::delay::DelayNs;

use crate::{Error, IoWire, OpCode};

pub const SCRATCHPAD_SIZE: usize = 9;

/// Reset low time in microseconds.
const RESET_PULSE_US: u32 = 500;
/// Window after releasing the line in which the presence pulse must appear.
const PRESENCE_WINDOW_US: u32 = 480;
/// Presence sampling interval inside the window.
const PRESENCE_SAMPLE_US: u32 = 30;

#[derive(Clone, Copy, Debug)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[repr(u8)]
pub enum Command {
    SkipRom = 0xCC,
    Convert = 0x44,
    ReadScratchpad = 0xBE,
}

impl OpCode for Command {
    fn op_code(&self) -> u8 {
        *self as _
    }
}

pub struct Ds1820<W: IoWire> {
    wire: W,
    scratchpad: [u8; SCRATCHPAD_SIZE],
}

impl<E: Debug, W: IoWire<Error = E>> Ds1820<W> {
    pub fn new(wire: W) -> Self {
        Ds1820 {
            wire,
            scratchpad: [0; SCRATCHPAD_SIZE],
        }
    }

    /// Binds to the bus: issues a reset and checks for a presence pulse.
    pub fn probe(&mut self, delay: &mut impl DelayNs) -> Result<(), Error<E>> {
        if self.reset(delay)? {
            Ok(())
        } else {
            Err(Error::NoPresence)
        }
    }

    /// Resets the bus and listens for a presence pulse.
    ///
    /// The line is held low for 500us and released; the device answers by
    /// pulling the line low within a 480us window, sampled every 30us. The
    /// remainder of the window is waited out even after an early pulse so the
    /// reset has a fixed overall duration.
    pub fn reset(&mut self, delay: &mut impl DelayNs) -> Result<bool, E> {
        self.wire.set_low()?;
        delay.delay_us(RESET_PULSE_US);
        self.wire.set_high()?;

        let mut presence = false;
        let mut remaining = PRESENCE_WINDOW_US;
        while remaining > 0 {
            delay.delay_us(PRESENCE_SAMPLE_US);
            remaining -= PRESENCE_SAMPLE_US;
            if self.wire.is_low()? {
                presence = true;
                break;
            }
        }
        delay.delay_us(remaining);
        Ok(presence)
    }

    /// Runs one bit time slot and samples the line.
    ///
    /// Writing a 0 holds the line low through the slot; writing a 1 releases
    /// it right away. A read is a written 1 whose sample reflects the device.
    /// The slot lasts 62us regardless of the bit value.
    fn time_slot(&mut self, delay: &mut impl DelayNs, bit: bool) -> Result<bool, E> {
        self.wire.set_low()?;
        delay.delay_us(2);
        if bit {
            self.wire.set_high()?;
        }
        delay.delay_us(10);
        let sample = self.wire.is_high()?;
        delay.delay_us(50);
        self.wire.set_high()?;
        Ok(sample)
    }

    fn write_byte(&mut self, delay: &mut impl DelayNs, value: u8) -> Result<(), E> {
        for i in 0..8 {
            self.time_slot(delay, value & (0x01 << i) != 0)?;
        }
        Ok(())
    }

    fn read_byte(&mut self, delay: &mut impl DelayNs) -> Result<u8, E> {
        let mut value = 0;
        for i in 0..8 {
            if self.time_slot(delay, true)? {
                value |= 0x01 << i;
            }
        }
        Ok(value)
    }

    /// Measures and returns the temperature in degrees Celsius.
    ///
    /// Returns the sentinel `0.0` without issuing any command bytes when no
    /// device answers the bus reset. Polling for conversion completion has no
    /// timeout: a device that acknowledges the reset but never finishes the
    /// conversion blocks the caller indefinitely.
    ///
    /// The scratchpad checksum byte is read but not validated here; use
    /// [`Ds1820::scratchpad_crc_ok`] if the application wants the check.
    pub fn read(&mut self, delay: &mut impl DelayNs) -> Result<f32, Error<E>> {
        if !self.reset(delay)? {
            return Ok(0.0);
        }
        self.write_byte(delay, Command::SkipRom.op_code())?;
        self.write_byte(delay, Command::Convert.op_code())?;
        while !self.time_slot(delay, true)? {}

        if !self.reset(delay)? {
            return Ok(0.0);
        }
        self.write_byte(delay, Command::SkipRom.op_code())?;
        self.write_byte(delay, Command::ReadScratchpad.op_code())?;
        for i in 0..SCRATCHPAD_SIZE {
            self.scratchpad[i] = self.read_byte(delay)?;
        }
        self.reset(delay)?;

        Ok(decode_temperature(&self.scratchpad))
    }

    /// The scratchpad captured by the last [`Ds1820::read`].
    pub fn scratchpad(&self) -> &[u8; SCRATCHPAD_SIZE] {
        &self.scratchpad
    }

    /// Checks the stored scratchpad against its own checksum byte.
    pub fn scratchpad_crc_ok(&self) -> bool {
        crate::compute_partial_crc8(0, &self.scratchpad[..SCRATCHPAD_SIZE - 1])
            == self.scratchpad[SCRATCHPAD_SIZE - 1]
    }

    pub fn release(self) -> W {
        self.wire
    }
}

/// Scratchpad bytes 0 (LSB) and 1 (MSB) hold the temperature as a
/// two's-complement value in sixteenths of a degree.
fn decode_temperature(scratchpad: &[u8]) -> f32 {
    LittleEndian::read_u16(&scratchpad[0..2]) as i16 as f32 / 16.0
}

#[cfg(test)]
mod tests {
    use super::decode_temperature;

    #[test]
    fn decode_power_on_value() {
        // 0x0550 is the fixed power-on reset reading.
        assert_eq!(decode_temperature(&[0x50, 0x05]), 85.0);
    }

    #[test]
    fn decode_room_temperature() {
        assert_eq!(decode_temperature(&[0x91, 0x01]), 25.0625);
    }

    #[test]
    fn decode_zero() {
        assert_eq!(decode_temperature(&[0x00, 0x00]), 0.0);
    }

    #[test]
    fn decode_negative() {
        assert_eq!(decode_temperature(&[0x5E, 0xFF]), -10.125);
        assert_eq!(decode_temperature(&[0x90, 0xFC]), -55.0);
    }

    #[test]
    fn decode_half_degree() {
        assert_eq!(decode_temperature(&[0x08, 0x00]), 0.5);
        assert_eq!(decode_temperature(&[0xF8, 0xFF]), -0.5);
    }
}
