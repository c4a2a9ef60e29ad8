use core::fmt::Debug;

/// Error type
#[derive(Debug, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Error<E: Sized + Debug> {
    /// No presence pulse after a one-wire bus reset
    NoPresence,
    /// Acknowledgment bit sampled high after a transmitted byte
    NoAck,
    PortError(E),
}

impl<E: Sized + Debug> From<E> for Error<E> {
    fn from(e: E) -> Self {
        Error::PortError(e)
    }
}
