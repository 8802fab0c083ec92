//! Pipeline configuration.
//!
//! One validated struct collecting every tunable: font preferences, atlas
//! sizing and mipmaps, oversampling, and cache bounds.

use std::time::Duration;

use crate::error::{Result, TextError};

#[derive(Debug, Clone)]
pub struct TextConfig {
    /// Font family names tried, in order, before falling back to generic
    /// system/serif/sans-serif/monospace discovery.
    pub preferred_font_names: Vec<String>,
    pub default_font_size: u16,
    pub anti_alias: bool,
    pub fractional_metrics: bool,
    pub mipmap: bool,
    /// Number of mipmap levels to generate when `mipmap` is set. Ignored
    /// otherwise.
    pub mipmap_level: u8,
    /// Oversampling factor applied before rasterization (1, 2, or 4).
    pub resolution_factor: u8,
    pub cache_capacity: usize,
    pub cache_ttl: Duration,
    pub atlas_width: u32,
    pub atlas_height: u32,
}

impl Default for TextConfig {
    fn default() -> Self {
        TextConfig {
            preferred_font_names: Vec::new(),
            default_font_size: 16,
            anti_alias: true,
            fractional_metrics: false,
            mipmap: false,
            mipmap_level: 0,
            resolution_factor: 2,
            cache_capacity: 1000,
            cache_ttl: Duration::from_secs(20),
            atlas_width: 1024,
            atlas_height: 1024,
        }
    }
}

impl TextConfig {
    /// Validates configuration invariants that can only be checked once,
    /// at construction. Per the error-handling design, this is the single
    /// fatal error path in the whole crate.
    pub fn validate(&self) -> Result<()> {
        if self.mipmap && (!self.atlas_width.is_power_of_two() || !self.atlas_height.is_power_of_two())
        {
            return Err(TextError::InvalidAtlasConfig);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        assert!(TextConfig::default().validate().is_ok());
    }

    #[test]
    fn mipmap_requires_power_of_two_dimensions() {
        let mut cfg = TextConfig {
            mipmap: true,
            atlas_width: 1000,
            ..TextConfig::default()
        };
        assert!(cfg.validate().is_err());
        cfg.atlas_width = 1024;
        assert!(cfg.validate().is_ok());
    }
}
