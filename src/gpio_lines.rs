//! Button lines on the GPIO character device.
//!
//! Buttons short the line to ground, so lines are requested `ACTIVE_LOW` and
//! the kernel reports a pressed button as 1. The pull-up comes from the board
//! config (`gpio=17,27=ip,pu` on a Raspberry Pi).

use crate::debounce::{ButtonLine, InputError};
use linux_embedded_hal::gpio_cdev::{Chip, LineHandle, LineRequestFlags};

const CONSUMER: &str = "pi-status-display";

pub struct CdevButtonLine {
    line: LineHandle,
}

impl CdevButtonLine {
    pub fn new(chip: &mut Chip, offset: u32) -> Result<Self, InputError> {
        let line = chip
            .get_line(offset)
            .map_err(|e| InputError(format!("line {offset}: {e}")))?
            .request(
                LineRequestFlags::INPUT | LineRequestFlags::ACTIVE_LOW,
                0,
                CONSUMER,
            )
            .map_err(|e| InputError(format!("line {offset}: {e}")))?;
        Ok(Self { line })
    }
}

impl ButtonLine for CdevButtonLine {
    fn is_active(&mut self) -> Result<bool, InputError> {
        Ok(self
            .line
            .get_value()
            .map_err(|e| InputError(e.to_string()))?
            == 1)
    }
}

/// Open the chip and request both button lines.
pub fn open(
    chip_path: &str,
    navigate: u32,
    shutdown: u32,
) -> Result<(CdevButtonLine, CdevButtonLine), InputError> {
    let mut chip =
        Chip::new(chip_path).map_err(|e| InputError(format!("open {chip_path}: {e}")))?;
    Ok((
        CdevButtonLine::new(&mut chip, navigate)?,
        CdevButtonLine::new(&mut chip, shutdown)?,
    ))
}
