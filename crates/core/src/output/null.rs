use super::error::Result;
use super::output::OutputDriver;

/// Reserves channel space without transmitting anything
pub struct NullDriver {
    channels: usize,
}

impl NullDriver {
    pub fn new(channels: usize) -> Self {
        Self { channels }
    }
}

impl OutputDriver for NullDriver {
    fn open(&mut self) -> Result<()> {
        log::debug!("Null output reserving {} channels", self.channels);
        Ok(())
    }

    fn close(&mut self) {}

    fn set_channels(&mut self, _offset: usize, _data: &[u8]) {}

    fn all_off(&mut self) {}

    fn end_frame(&mut self) -> Result<()> {
        Ok(())
    }
}
