/// Lookup table scaling channel values by a brightness percentage.
///
/// The table is only rebuilt when the requested brightness differs from the
/// one it was last built for.
#[derive(Debug, Clone)]
pub struct BrightnessLut {
    built_for: Option<u8>,
    table: [u8; 256],
    regenerations: u64,
}

impl Default for BrightnessLut {
    fn default() -> Self {
        Self::new()
    }
}

impl BrightnessLut {
    pub fn new() -> Self {
        Self {
            built_for: None,
            table: [0; 256],
            regenerations: 0,
        }
    }

    /// How many times the table has been rebuilt
    pub fn regenerations(&self) -> u64 {
        self.regenerations
    }

    fn rebuild(&mut self, brightness: u8) {
        for (i, entry) in self.table.iter_mut().enumerate() {
            *entry = (i * brightness as usize / 100) as u8;
        }
        self.built_for = Some(brightness);
        self.regenerations += 1;
        log::debug!("Rebuilt brightness table for {}%", brightness);
    }

    /// Scale every byte of `buffer`. Brightness of 100 or more is a no-op.
    pub fn apply(&mut self, brightness: u8, buffer: &mut [u8]) {
        if brightness >= 100 {
            return;
        }

        if self.built_for != Some(brightness) {
            self.rebuild(brightness);
        }

        for b in buffer.iter_mut() {
            *b = self.table[*b as usize];
        }
    }
}
