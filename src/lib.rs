#![no_std]
#![doc = include_str!("../README.md")]

mod command;
#[cfg(feature = "ds1820")]
pub mod ds1820;
mod iowire;
#[cfg(feature = "mlx90614")]
pub mod mlx90614;
mod result;
#[cfg(feature = "sht1x")]
pub mod sht1x;

pub use command::OpCode;
pub use iowire::IoWire;
pub use result::Error;

/// Dallas/Maxim CRC-8 (polynomial 0x31 reflected, shift value 0x8C) over
/// `data`, continuing from `crc`.
///
/// This is the checksum appended to the one-wire scratchpad. The one-wire
/// driver never validates it on its own; see
/// [`ds1820::Ds1820::scratchpad_crc_ok`] for the opt-in check.
pub fn compute_partial_crc8(crc: u8, data: &[u8]) -> u8 {
    let mut crc = crc;
    for byte in data.iter() {
        let mut byte = *byte;
        for _ in 0..8 {
            let mix = (crc ^ byte) & 0x01;
            crc >>= 1;
            if mix != 0x00 {
                crc ^= 0x8C;
            }
            byte >>= 1;
        }
    }
    crc
}

#[cfg(test)]
mod tests {
    use super::compute_partial_crc8;

    #[test]
    fn crc8_of_power_on_scratchpad() {
        let scratchpad = [0x50, 0x05, 0x4B, 0x46, 0x7F, 0xFF, 0x0C, 0x10];
        assert_eq!(compute_partial_crc8(0, &scratchpad), 0x1C);
    }

    #[test]
    fn crc8_is_resumable() {
        let data = [0x50, 0x05, 0x4B, 0x46, 0x7F, 0xFF, 0x0C, 0x10];
        let partial = compute_partial_crc8(0, &data[..3]);
        assert_eq!(compute_partial_crc8(partial, &data[3..]), 0x1C);
    }
}
