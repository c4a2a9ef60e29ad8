/// A byte-sized operation code understood by a device.
///
/// Each driver defines its own command enum implementing this.
pub trait OpCode {
    fn op_code(&self) -> u8;
}
