//! Stream voltages from a MAX11254 wired to a Raspberry Pi.

#[cfg(feature = "raspberry_pi")]
fn main() -> Result<(), anyhow::Error> {
    use std::cell::RefCell;

    use anyhow::anyhow;
    use embedded_hal_bus::spi::RefCellDevice;
    use max11254::{Calibration, Max11254, Mode};
    use rppal::gpio::Gpio;
    use rppal::hal::Delay;
    use rppal::spi::{Bus, Mode as SpiMode, SlaveSelect, Spi};

    /// Rate-table selector for the conversion-start command.
    const RATE: u8 = 0b0011;

    let gpio = Gpio::new()?;

    let spi = Spi::new(Bus::Spi0, SlaveSelect::Ss0, 1_000_000, SpiMode::Mode0)?;

    let spi = RefCell::new(spi);

    let spi = RefCellDevice::new(&spi, gpio.get(24)?.into_output(), Delay::new());

    let mut adc = Max11254::new(
        spi,
        gpio.get(23)?.into_output(),
        gpio.get(25)?.into_input(),
        Delay::new(),
        2.5,
    );

    adc.begin().map_err(|e| anyhow!("{e}"))?;

    adc.calibrate(Calibration::SelfCal)
        .map_err(|e| anyhow!("{e}"))?;

    adc.set_mode(Mode::SingleCycleContinuous)
        .map_err(|e| anyhow!("{e}"))?;

    adc.start_conversion(RATE).map_err(|e| anyhow!("{e}"))?;

    loop {
        adc.wait_data_ready().map_err(|e| anyhow!("{e}"))?;

        let codes = adc.read_all_channels().map_err(|e| anyhow!("{e}"))?;

        for (channel, code) in codes.into_iter().enumerate() {
            let volts = adc.voltage(code).map_err(|e| anyhow!("{e}"))?;

            println!("CH{channel}: {code:024b} = {volts:.6} V");
        }
    }
}

#[cfg(not(feature = "raspberry_pi"))]
fn main() {
    eprintln!("voltrs does nothing without the `raspberry_pi` feature enabled");
}
