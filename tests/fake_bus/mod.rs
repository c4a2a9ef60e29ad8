//! Simulated bus lines for driving the drivers without hardware.
//!
//! All pins created from one [`Bus`] share its state: input reads are served
//! from a scripted queue of line levels (falling back to a default level once
//! the script runs out), data-line output transitions are logged, and the
//! clock pin latches the data-line level on every rising edge, the way a
//! listening device would.

#![allow(dead_code)]

use core::convert::Infallible;
use embedded_hal::delay::DelayNs;
use embedded_hal::digital::{ErrorType, InputPin, OutputPin};
use embedded_hal::i2c::{I2c, Operation, SevenBitAddress};
use std::cell::RefCell;
use std::collections::VecDeque;
use std::rc::Rc;

#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Op {
    SetHigh,
    SetLow,
}

#[derive(Default)]
struct BusState {
    data_level: bool,
    sck_level: bool,
    reads: VecDeque<bool>,
    default_read: bool,
    ops: Vec<Op>,
    sampled: Vec<bool>,
}

#[derive(Clone)]
pub struct Bus(Rc<RefCell<BusState>>);

impl Bus {
    /// A bus whose data line idles at `idle_level` when nothing is scripted.
    pub fn new(idle_level: bool) -> Self {
        Bus(Rc::new(RefCell::new(BusState {
            data_level: idle_level,
            default_read: idle_level,
            ..BusState::default()
        })))
    }

    /// Appends line levels to be returned by subsequent input reads.
    pub fn script(&self, levels: &[bool]) {
        self.0.borrow_mut().reads.extend(levels.iter().copied());
    }

    /// Scripts one byte as it appears on the one-wire bus (LSB first).
    pub fn script_byte_lsb(&self, value: u8) {
        for i in 0..8 {
            self.0.borrow_mut().reads.push_back(value & (0x01 << i) != 0);
        }
    }

    /// Scripts one byte as it appears on the two-wire bus (MSB first).
    pub fn script_byte_msb(&self, value: u8) {
        for i in 0..8 {
            self.0.borrow_mut().reads.push_back(value & (0x80 >> i) != 0);
        }
    }

    pub fn data_pin(&self) -> DataPin {
        DataPin(self.0.clone())
    }

    pub fn sck_pin(&self) -> SckPin {
        SckPin(self.0.clone())
    }

    /// Output transitions driven on the data line so far.
    pub fn ops(&self) -> Vec<Op> {
        self.0.borrow().ops.clone()
    }

    /// Data-line levels latched at each clock rising edge.
    pub fn sampled(&self) -> Vec<bool> {
        self.0.borrow().sampled.clone()
    }

    pub fn remaining_script(&self) -> usize {
        self.0.borrow().reads.len()
    }
}

pub struct DataPin(Rc<RefCell<BusState>>);

impl DataPin {
    fn read_level(&self) -> bool {
        let mut state = self.0.borrow_mut();
        match state.reads.pop_front() {
            Some(level) => level,
            None => state.default_read,
        }
    }
}

impl ErrorType for DataPin {
    type Error = Infallible;
}

impl InputPin for DataPin {
    fn is_high(&mut self) -> Result<bool, Self::Error> {
        Ok(self.read_level())
    }

    fn is_low(&mut self) -> Result<bool, Self::Error> {
        Ok(!self.read_level())
    }
}

impl OutputPin for DataPin {
    fn set_low(&mut self) -> Result<(), Self::Error> {
        let mut state = self.0.borrow_mut();
        state.data_level = false;
        state.ops.push(Op::SetLow);
        Ok(())
    }

    fn set_high(&mut self) -> Result<(), Self::Error> {
        let mut state = self.0.borrow_mut();
        state.data_level = true;
        state.ops.push(Op::SetHigh);
        Ok(())
    }
}

pub struct SckPin(Rc<RefCell<BusState>>);

impl ErrorType for SckPin {
    type Error = Infallible;
}

impl OutputPin for SckPin {
    fn set_low(&mut self) -> Result<(), Self::Error> {
        self.0.borrow_mut().sck_level = false;
        Ok(())
    }

    fn set_high(&mut self) -> Result<(), Self::Error> {
        let mut state = self.0.borrow_mut();
        if !state.sck_level {
            let level = state.data_level;
            state.sampled.push(level);
        }
        state.sck_level = true;
        Ok(())
    }
}

/// Delays collapse to nothing against the simulated bus.
pub struct NoopDelay;

impl DelayNs for NoopDelay {
    fn delay_ns(&mut self, _ns: u32) {}
}

/// Scripted I2C peripheral answering every read with the same response.
pub struct FakeI2c {
    pub response: Vec<u8>,
    pub writes: Vec<Vec<u8>>,
}

impl FakeI2c {
    pub fn new(response: &[u8]) -> Self {
        FakeI2c {
            response: response.to_vec(),
            writes: Vec::new(),
        }
    }
}

impl embedded_hal::i2c::ErrorType for FakeI2c {
    type Error = Infallible;
}

impl I2c for FakeI2c {
    fn transaction(
        &mut self,
        _address: SevenBitAddress,
        operations: &mut [Operation<'_>],
    ) -> Result<(), Self::Error> {
        for operation in operations.iter_mut() {
            match operation {
                Operation::Write(bytes) => self.writes.push(bytes.to_vec()),
                Operation::Read(buffer) => {
                    let len = buffer.len();
                    buffer.copy_from_slice(&self.response[..len]);
                }
            }
        }
        Ok(())
    }
}
