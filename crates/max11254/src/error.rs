//! Error type for MAX11254 transactions.

use core::fmt;

/// Errors surfaced by the injected SPI device or GPIO pins.
///
/// The driver performs no validation of device responses and never
/// synthesizes errors of its own; the only failures it reports are
/// those raised by the transport layer itself.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Error<SpiE, PinE> {
    /// Underlying SPI transaction error.
    Spi(SpiE),
    /// Reset or data-ready pin error.
    Pin(PinE),
}

impl<SpiE: fmt::Debug, PinE: fmt::Debug> fmt::Display for Error<SpiE, PinE> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Error::Spi(e) => write!(f, "SPI error: {:?}", e),
            Error::Pin(e) => write!(f, "pin error: {:?}", e),
        }
    }
}

#[cfg(feature = "defmt")]
impl<SpiE: defmt::Format, PinE: defmt::Format> defmt::Format for Error<SpiE, PinE> {
    fn format(&self, f: defmt::Formatter) {
        match self {
            Error::Spi(e) => defmt::write!(f, "SPI error: {}", e),
            Error::Pin(e) => defmt::write!(f, "pin error: {}", e),
        }
    }
}
