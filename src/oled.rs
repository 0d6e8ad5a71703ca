//! SSD1306 128x64 OLED over I2C.
//!
//! Frames are rendered into a [`PixelBuffer`] first and blitted whole into the
//! driver's buffered graphics mode, then flushed in one transfer.
//!
//! The controller is initialised lazily on the first write and again after
//! any failed write, so a panel that is missing at boot or loses power later
//! comes back on the next frame.

use crate::config::Brightness;
use crate::display::{DisplaySink, TransportError};
use crate::framebuffer::PixelBuffer;
use embedded_graphics::{image::Image, image::ImageRaw, pixelcolor::BinaryColor, prelude::*};
use linux_embedded_hal::I2cdev;
use ssd1306::mode::{BufferedGraphicsMode, DisplayConfig as _};
use ssd1306::{prelude::*, I2CDisplayInterface, Ssd1306};
use tracing::debug;

type Panel<I2C> =
    Ssd1306<I2CInterface<I2C>, DisplaySize128x64, BufferedGraphicsMode<DisplaySize128x64>>;

pub struct OledSink<I2C> {
    panel: Panel<I2C>,
    brightness: Brightness,
    initialised: bool,
}

fn init_err<E: core::fmt::Debug>(e: E) -> TransportError {
    TransportError::Init(format!("{e:?}"))
}

fn write_err<E: core::fmt::Debug>(e: E) -> TransportError {
    TransportError::Write(format!("{e:?}"))
}

fn contrast(level: Brightness) -> ssd1306::prelude::Brightness {
    use ssd1306::prelude::Brightness as Level;
    match level {
        Brightness::Dimmest => Level::DIMMEST,
        Brightness::Dim => Level::DIM,
        Brightness::Normal => Level::NORMAL,
        Brightness::Bright => Level::BRIGHT,
        Brightness::Brightest => Level::BRIGHTEST,
    }
}

impl<I2C: embedded_hal::i2c::I2c> OledSink<I2C> {
    /// Wrap the bus. Nothing is sent until the first push or clear.
    pub fn new(i2c: I2C, address: u8, brightness: Brightness) -> Self {
        let interface = I2CDisplayInterface::new_custom_address(i2c, address);
        let panel = Ssd1306::new(interface, DisplaySize128x64, DisplayRotation::Rotate0)
            .into_buffered_graphics_mode();
        Self {
            panel,
            brightness,
            initialised: false,
        }
    }

    pub fn is_initialised(&self) -> bool {
        self.initialised
    }

    fn ensure_initialised(&mut self) -> Result<(), TransportError> {
        if self.initialised {
            return Ok(());
        }
        self.panel.init().map_err(init_err)?;
        self.panel
            .set_brightness(contrast(self.brightness))
            .map_err(init_err)?;
        self.initialised = true;
        debug!("OLED controller initialised");
        Ok(())
    }

    fn write(&mut self, frame: Option<&PixelBuffer>) -> Result<(), TransportError> {
        self.ensure_initialised()?;
        self.panel.clear_buffer();
        if let Some(frame) = frame {
            let raw = ImageRaw::<BinaryColor>::new(frame.as_bytes(), frame.width());
            Image::new(&raw, Point::zero())
                .draw(&mut self.panel)
                .map_err(write_err)?;
        }
        self.panel.flush().map_err(write_err)
    }

    fn write_or_reset(&mut self, frame: Option<&PixelBuffer>) -> Result<(), TransportError> {
        let result = self.write(frame);
        if result.is_err() {
            // The panel may have lost power; redo the init sequence next time.
            self.initialised = false;
        }
        result
    }
}

impl OledSink<I2cdev> {
    /// Open the configured I2C bus. Fails only when the bus device itself
    /// cannot be opened.
    pub fn open(config: &crate::config::DisplayConfig) -> Result<Self, TransportError> {
        let i2c = I2cdev::new(&config.i2c_bus)
            .map_err(|e| TransportError::Init(format!("{}: {e:?}", config.i2c_bus)))?;
        Ok(Self::new(i2c, config.address, config.brightness))
    }
}

impl<I2C: embedded_hal::i2c::I2c> DisplaySink for OledSink<I2C> {
    fn push(&mut self, frame: &PixelBuffer) -> Result<(), TransportError> {
        self.write_or_reset(Some(frame))
    }

    fn clear(&mut self) -> Result<(), TransportError> {
        self.write_or_reset(None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use embedded_hal::i2c::{ErrorKind, ErrorType, I2c, NoAcknowledgeSource, Operation};
    use std::cell::Cell;
    use std::rc::Rc;

    /// A bus that NACKs everything while unplugged.
    #[derive(Clone, Default)]
    struct Bus {
        plugged: Rc<Cell<bool>>,
        transfers: Rc<Cell<usize>>,
    }

    impl ErrorType for Bus {
        type Error = ErrorKind;
    }

    impl I2c for Bus {
        fn transaction(
            &mut self,
            _address: u8,
            _operations: &mut [Operation<'_>],
        ) -> Result<(), Self::Error> {
            if !self.plugged.get() {
                return Err(ErrorKind::NoAcknowledge(NoAcknowledgeSource::Address));
            }
            self.transfers.set(self.transfers.get() + 1);
            Ok(())
        }
    }

    #[test]
    fn construction_does_not_touch_the_bus() {
        let bus = Bus::default();
        let sink = OledSink::new(bus.clone(), 0x3C, Brightness::Normal);
        assert!(!sink.is_initialised());
        assert_eq!(bus.transfers.get(), 0);
    }

    #[test]
    fn absent_panel_is_initialised_once_it_answers() {
        let bus = Bus::default();
        let mut sink = OledSink::new(bus.clone(), 0x3C, Brightness::Dim);
        let frame = PixelBuffer::panel();

        assert!(sink.push(&frame).is_err());
        assert!(!sink.is_initialised());

        bus.plugged.set(true);
        sink.push(&frame).unwrap();
        assert!(sink.is_initialised());
        assert!(bus.transfers.get() > 0);
    }

    #[test]
    fn failed_write_forces_reinitialisation() {
        let bus = Bus::default();
        bus.plugged.set(true);
        let mut sink = OledSink::new(bus.clone(), 0x3C, Brightness::Normal);
        sink.push(&PixelBuffer::panel()).unwrap();
        assert!(sink.is_initialised());

        bus.plugged.set(false);
        assert!(sink.clear().is_err());
        assert!(!sink.is_initialised());

        bus.plugged.set(true);
        sink.clear().unwrap();
        assert!(sink.is_initialised());
    }
}
