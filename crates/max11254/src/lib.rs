//! Provides a driver for a Maxim MAX11254 six-channel 24-bit delta-sigma
//! ADC via the `embedded-hal` ecosystem.
//!
//! The bus, chip-select, reset line, data-ready line, and delay source
//! are injected `embedded-hal` resources, so the register framing,
//! calibration sequencing, and voltage decoding all run against any HAL
//! or against a scripted transport in tests.
//!
//! This layer does no bus-health checking: a disconnected or unpowered
//! device reads back as plausible garbage rather than an error, and
//! [`Max11254::wait_data_ready`] blocks forever if no conversion ever
//! completes. Callers needing robustness should bound the wait
//! ([`Max11254::wait_data_ready_timeout`]) and sanity-check the decoded
//! voltages themselves.

#![no_std]
#![forbid(unsafe_code)]

#[cfg(test)]
extern crate std;

use embedded_hal::delay::DelayNs;
use embedded_hal::digital::{InputPin, OutputPin};
use embedded_hal::spi::{Operation, SpiDevice};

mod decode;
mod error;
pub mod registers;

pub use decode::decode;
pub use error::Error;
pub use registers::Register;

use registers::{
    Access, CMD_CALIBRATE, CMD_CONVERT, CTRL1_MODE_MASK, CTRL1_SELF_CAL, CTRL1_SYS_GAIN_CAL,
    CTRL1_SYS_OFFSET_CAL, CTRL1_UNIPOLAR, CTRL3_CAL_DISABLED, CTRL3_CAL_ENABLED, CTRL3_SELF_CAL,
};

/// Settle time with the reset line held low.
const RESET_SETTLE_MS: u32 = 100;
/// Fixed wait for a calibration pass; completion is time based, the
/// device's completion flag is not polled.
const CALIBRATION_SETTLE_MS: u32 = 200;
/// Settle between the offset and gain phases of a system calibration.
const CALIBRATION_PHASE_GAP_MS: u32 = 6;

/// Calibration variants of the MAX11254.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Calibration {
    /// Disable every calibration path.
    Disabled,
    /// Device-internal self-calibration.
    SelfCal,
    /// Full system calibration: self, then system offset, then system
    /// gain, with the coefficient registers cycled around the passes.
    Full,
}

/// Conversion sequencing mode, held in the low two bits of CTRL1.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[repr(u8)]
pub enum Mode {
    /// Free-running conversions.
    Continuous = 0b00,
    /// One conversion per start command.
    SingleCycle = 0b10,
    /// Repeated single-cycle conversions from one start command.
    SingleCycleContinuous = 0b11,
}

/// Input channel list for the MAX11254.
#[allow(missing_docs)]
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[repr(u8)]
pub enum Channel {
    CH0 = 0,
    CH1 = 1,
    CH2 = 2,
    CH3 = 3,
    CH4 = 4,
    CH5 = 5,
}

impl Channel {
    /// Iterate over all channels in data-register order.
    pub fn all() -> impl Iterator<Item = Self> {
        [
            Self::CH0,
            Self::CH1,
            Self::CH2,
            Self::CH3,
            Self::CH4,
            Self::CH5,
        ]
        .into_iter()
    }

    fn data_register(self) -> Register {
        match self {
            Channel::CH0 => Register::Data0,
            Channel::CH1 => Register::Data1,
            Channel::CH2 => Register::Data2,
            Channel::CH3 => Register::Data3,
            Channel::CH4 => Register::Data4,
            Channel::CH5 => Register::Data5,
        }
    }
}

/// MAX11254 driver.
///
/// Owns the SPI device, the reset and data-ready pins, a delay
/// provider, and the reference voltage. Device state (calibration,
/// mode, polarity) lives in hardware registers and is never mirrored
/// here; anything that depends on it re-reads the register.
pub struct Max11254<SPI, RST, RDY, D> {
    spi: SPI,
    rst: RST,
    rdy: RDY,
    delay: D,
    reference_voltage: f64,
}

impl<SPI, RST, RDY, D, PinE> Max11254<SPI, RST, RDY, D>
where
    SPI: SpiDevice,
    RST: OutputPin<Error = PinE>,
    RDY: InputPin<Error = PinE>,
    D: DelayNs,
{
    /// Creates a new driver from an SPI device, the reset and
    /// data-ready pins, and a delay provider.
    ///
    /// Please ensure the SPI bus is in SPI mode 0, aka (0, 0), with
    /// MSB-first bit order. `reference_voltage` is the REF+ − REF−
    /// potential in volts and is fixed for the life of the driver.
    pub fn new(spi: SPI, rst: RST, rdy: RDY, delay: D, reference_voltage: f64) -> Self {
        Self {
            spi,
            rst,
            rdy,
            delay,
            reference_voltage,
        }
    }

    /// Resets the chip to its default settings by power cycling the
    /// reset line.
    pub fn reset(&mut self) -> Result<(), Error<SPI::Error, PinE>> {
        self.rst.set_low().map_err(Error::Pin)?;
        self.delay.delay_ms(RESET_SETTLE_MS);
        self.rst.set_high().map_err(Error::Pin)?;

        Ok(())
    }

    /// Brings the converter up after power-on: resets the chip, then
    /// selects and deselects it once to reset its SPI controller.
    ///
    /// Must run once per power cycle before any register access is
    /// trusted.
    pub fn begin(&mut self) -> Result<(), Error<SPI::Error, PinE>> {
        self.reset()?;

        self.spi
            .transaction(&mut [Operation::DelayNs(RESET_SETTLE_MS * 1_000_000)])
            .map_err(Error::Spi)
    }

    /// Writes `value` to a register, most-significant byte first, as
    /// one chip-select-framed transaction.
    ///
    /// The register's declared width decides how many bytes move;
    /// excess high bits of `value` are ignored.
    pub fn write_register(
        &mut self,
        register: Register,
        value: u32,
    ) -> Result<(), Error<SPI::Error, PinE>> {
        let bits = register.bits();
        let count = (bits / 8) as usize;
        let mut frame = [0u8; 4];

        frame[0] = register.frame(Access::Write);

        for (index, byte) in frame[1..=count].iter_mut().enumerate() {
            *byte = ((value >> (bits - 8 - 8 * index as u32)) & 0xFF) as u8;
        }

        self.spi
            .transaction(&mut [Operation::Write(&frame[..=count])])
            .map_err(Error::Spi)
    }

    /// Reads a register, clocking out zeros and accumulating the
    /// response big-endian.
    ///
    /// The returned value is whatever the device put on the bus; no
    /// plausibility checks are applied.
    pub fn read_register(&mut self, register: Register) -> Result<u32, Error<SPI::Error, PinE>> {
        let count = (register.bits() / 8) as usize;
        let mut frame = [0u8; 4];

        frame[0] = register.frame(Access::Read);

        self.spi
            .transaction(&mut [Operation::TransferInPlace(&mut frame[..=count])])
            .map_err(Error::Spi)?;

        let mut value = 0u32;

        for byte in &frame[1..=count] {
            value = (value << 8) | u32::from(*byte);
        }

        Ok(value)
    }

    /// Sends a single-byte command in its own chip-select frame.
    pub fn command(&mut self, command: u8) -> Result<(), Error<SPI::Error, PinE>> {
        self.spi
            .transaction(&mut [Operation::Write(&[command])])
            .map_err(Error::Spi)
    }

    /// Performs the selected calibration, including its fixed settle
    /// waits.
    ///
    /// [`Calibration::Full`] runs two command phases with coefficient
    /// register reads before and after; the order and the intermediate
    /// settle are required by the device, reordering yields wrong
    /// coefficients.
    pub fn calibrate(&mut self, kind: Calibration) -> Result<(), Error<SPI::Error, PinE>> {
        match kind {
            Calibration::Disabled => {
                self.write_register(Register::Ctrl3, CTRL3_CAL_DISABLED.into())?;
            }
            Calibration::SelfCal => {
                self.write_register(Register::Ctrl3, CTRL3_SELF_CAL.into())?;
                self.write_register(Register::Ctrl1, CTRL1_SELF_CAL.into())?;
                self.command(CMD_CALIBRATE)?;
                self.delay.delay_ms(CALIBRATION_SETTLE_MS);
            }
            Calibration::Full => {
                self.write_register(Register::Ctrl3, CTRL3_CAL_ENABLED.into())?;

                // Cycling the coefficient registers synchronises the
                // device's internal calibration state; the values are
                // discarded.
                self.read_register(Register::OffsetCal)?;
                self.read_register(Register::GainCal)?;

                self.write_register(Register::Ctrl1, CTRL1_SYS_OFFSET_CAL.into())?;
                self.command(CMD_CALIBRATE)?;
                self.delay.delay_ms(CALIBRATION_SETTLE_MS);

                self.delay.delay_ms(CALIBRATION_PHASE_GAP_MS);
                self.write_register(Register::Ctrl1, CTRL1_SYS_GAIN_CAL.into())?;
                self.command(CMD_CALIBRATE)?;
                self.delay.delay_ms(CALIBRATION_SETTLE_MS);

                self.read_register(Register::OffsetCal)?;
                self.read_register(Register::GainCal)?;
            }
        }

        Ok(())
    }

    /// Selects the conversion sequencing mode.
    ///
    /// Read-modify-write of CTRL1: only the low two bits change, the
    /// upper six (gain, polarity, calibration selection) survive.
    pub fn set_mode(&mut self, mode: Mode) -> Result<(), Error<SPI::Error, PinE>> {
        let ctrl1 = self.read_register(Register::Ctrl1)? as u8;
        let ctrl1 = (ctrl1 & !CTRL1_MODE_MASK) | mode as u8;

        self.write_register(Register::Ctrl1, ctrl1.into())
    }

    /// Starts acquisition at the given 4-bit rate selector.
    ///
    /// `rate` indexes the device's rate table (datasheet table 1) and
    /// is masked to 4 bits.
    pub fn start_conversion(&mut self, rate: u8) -> Result<(), Error<SPI::Error, PinE>> {
        self.command(CMD_CONVERT | (rate & 0x0F))
    }

    /// Probes the active-low ready line once.
    pub fn data_ready(&mut self) -> Result<bool, Error<SPI::Error, PinE>> {
        self.rdy.is_low().map_err(Error::Pin)
    }

    /// Blocks until the ready line signals (1 → 0) that a conversion
    /// is available.
    ///
    /// Busy-polls with no timeout; a stuck or disconnected device
    /// hangs the caller indefinitely. Run this before reading new
    /// values from the data registers, once per group of enabled
    /// channels.
    pub fn wait_data_ready(&mut self) -> Result<(), Error<SPI::Error, PinE>> {
        while self.rdy.is_high().map_err(Error::Pin)? {}

        Ok(())
    }

    /// Bounded variant of [`Max11254::wait_data_ready`], polling at a
    /// 1 ms cadence. Returns `false` if the line never went active
    /// within `timeout_ms`.
    pub fn wait_data_ready_timeout(
        &mut self,
        timeout_ms: u32,
    ) -> Result<bool, Error<SPI::Error, PinE>> {
        let mut remaining = timeout_ms;

        loop {
            if self.data_ready()? {
                return Ok(true);
            }

            if remaining == 0 {
                return Ok(false);
            }

            self.delay.delay_ms(1);
            remaining -= 1;
        }
    }

    /// Reads one channel's raw 24-bit conversion code.
    pub fn read_channel(&mut self, channel: Channel) -> Result<u32, Error<SPI::Error, PinE>> {
        self.read_register(channel.data_register())
    }

    /// Reads all six data registers in channel order 0–5.
    ///
    /// The CHMAP0/CHMAP1 order bits must be set to sequence channels
    /// 0 to 5 (ex. `CHMAP0 = 0xE0A06`, `CHMAP1 = 0x1A1612`), and
    /// data-ready must have been confirmed for the group first.
    pub fn read_all_channels(&mut self) -> Result<[u32; 6], Error<SPI::Error, PinE>> {
        let mut codes = [0u32; 6];

        for (code, channel) in codes.iter_mut().zip(Channel::all()) {
            *code = self.read_channel(channel)?;
        }

        Ok(codes)
    }

    /// Converts a raw conversion code into volts.
    ///
    /// The polarity flag is re-read from CTRL1 on every call rather
    /// than cached, so a mode change between acquisitions cannot skew
    /// the decoding.
    pub fn voltage(&mut self, code: u32) -> Result<f64, Error<SPI::Error, PinE>> {
        let ctrl1 = self.read_register(Register::Ctrl1)?;
        let unipolar = ctrl1 as u8 & CTRL1_UNIPOLAR != 0;

        Ok(decode(code, unipolar, self.reference_voltage))
    }

    /// Reads all six channels and decodes each into volts.
    pub fn read_voltages(&mut self) -> Result<[f64; 6], Error<SPI::Error, PinE>> {
        let mut voltages = [0f64; 6];

        for (volts, channel) in voltages.iter_mut().zip(Channel::all()) {
            let code = self.read_channel(channel)?;

            *volts = self.voltage(code)?;
        }

        Ok(voltages)
    }
}
