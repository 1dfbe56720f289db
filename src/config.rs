//! # Sampler Configuration
//!
//! Board constants are fixed at compile time through cargo features. Runtime
//! tuning of a single sampler goes through [`SamplerConfig`].

use crate::error::AdcError;

/// Number of analog channels the board exposes. Sizes the slot array and
/// bounds both channel lists.
#[cfg(feature = "channels-16")]
pub const NUM_ANALOG_CHANNELS: usize = 16;

/// Number of analog channels the board exposes. Sizes the slot array and
/// bounds both channel lists.
#[cfg(not(feature = "channels-16"))]
pub const NUM_ANALOG_CHANNELS: usize = 8;

/// Pin number of the first analog input (`A0`). Identifiers at or above this
/// value are translated back to channel indices, so `A2` and `2` name the
/// same channel.
#[cfg(feature = "rp2350")]
pub const ANALOG_PIN_BASE: u8 = 26;

#[cfg(all(feature = "channels-16", not(feature = "rp2350")))]
pub const ANALOG_PIN_BASE: u8 = 54;

#[cfg(not(any(feature = "channels-16", feature = "rp2350")))]
pub const ANALOG_PIN_BASE: u8 = 14;

/// Conversion time above which a conversion is counted as slow (or, in
/// periodic mode, abandoned).
pub const DEFAULT_CONVERSION_TIMEOUT_US: u32 = 200;

/// Upper bound on readiness polls per periodic-mode interrupt. Keeps the
/// handler bounded even if the clock stops advancing.
pub const DEFAULT_MAX_POLLS: u32 = 4096;

/// Resolve a channel identifier (raw index or analog pin number) to a
/// channel index.
pub fn resolve_channel(id: u8) -> Result<u8, AdcError> {
    let n = NUM_ANALOG_CHANNELS as u8;
    if id < n {
        Ok(id)
    } else if id >= ANALOG_PIN_BASE && id - ANALOG_PIN_BASE < n {
        Ok(id - ANALOG_PIN_BASE)
    } else {
        Err(AdcError::ChannelOutOfRange(id))
    }
}

/// What invokes [`FastAdc::on_interrupt`](crate::FastAdc::on_interrupt).
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum TriggerMode {
    /// The ADC raises an interrupt when a conversion finishes. Each call
    /// stores the finished result and starts the next conversion.
    ConversionComplete,
    /// A periodic timer interrupt. Each call converts one channel start to
    /// finish, polling for the result with a bounded wait.
    Periodic,
}

/// Runtime tuning for one sampler.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct SamplerConfig {
    pub trigger: TriggerMode,
    /// Completed fast-list passes per slow-list advance. Must be at least 1.
    pub fast_passes_per_slow: u8,
    /// Must be at least 1.
    pub conversion_timeout_us: u32,
    /// Must be at least 1 in [`TriggerMode::Periodic`]; unused otherwise.
    pub max_polls: u32,
}

impl SamplerConfig {
    pub const fn new() -> Self {
        Self {
            trigger: TriggerMode::ConversionComplete,
            fast_passes_per_slow: 1,
            conversion_timeout_us: DEFAULT_CONVERSION_TIMEOUT_US,
            max_polls: DEFAULT_MAX_POLLS,
        }
    }

    pub const fn with_trigger(mut self, trigger: TriggerMode) -> Self {
        self.trigger = trigger;
        self
    }

    pub const fn with_fast_passes_per_slow(mut self, passes: u8) -> Self {
        self.fast_passes_per_slow = passes;
        self
    }

    pub const fn with_conversion_timeout_us(mut self, timeout_us: u32) -> Self {
        self.conversion_timeout_us = timeout_us;
        self
    }

    pub const fn with_max_polls(mut self, max_polls: u32) -> Self {
        self.max_polls = max_polls;
        self
    }

    pub(crate) fn validate(&self) -> Result<(), AdcError> {
        if self.fast_passes_per_slow == 0 {
            return Err(AdcError::InvalidInterleave);
        }
        if self.conversion_timeout_us == 0 {
            return Err(AdcError::InvalidTimeout);
        }
        if self.trigger == TriggerMode::Periodic && self.max_polls == 0 {
            return Err(AdcError::InvalidPollBudget);
        }
        Ok(())
    }
}

impl Default for SamplerConfig {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn raw_indices_resolve_to_themselves() {
        for id in 0..NUM_ANALOG_CHANNELS as u8 {
            assert_eq!(resolve_channel(id), Ok(id));
        }
    }

    #[test]
    fn pin_aliases_resolve_to_channel_indices() {
        assert_eq!(resolve_channel(ANALOG_PIN_BASE), Ok(0));
        assert_eq!(resolve_channel(ANALOG_PIN_BASE + 3), Ok(3));
        let last = ANALOG_PIN_BASE + NUM_ANALOG_CHANNELS as u8 - 1;
        assert_eq!(resolve_channel(last), Ok(NUM_ANALOG_CHANNELS as u8 - 1));
    }

    #[test]
    fn identifiers_outside_both_ranges_are_rejected() {
        let past_pins = ANALOG_PIN_BASE + NUM_ANALOG_CHANNELS as u8;
        assert_eq!(
            resolve_channel(past_pins),
            Err(AdcError::ChannelOutOfRange(past_pins))
        );
        assert_eq!(resolve_channel(255), Err(AdcError::ChannelOutOfRange(255)));
    }

    #[test]
    fn zero_interleave_is_invalid() {
        let cfg = SamplerConfig::new().with_fast_passes_per_slow(0);
        assert_eq!(cfg.validate(), Err(AdcError::InvalidInterleave));
        assert!(SamplerConfig::default().validate().is_ok());
    }

    #[test]
    fn zero_timeout_is_invalid() {
        let cfg = SamplerConfig::new().with_conversion_timeout_us(0);
        assert_eq!(cfg.validate(), Err(AdcError::InvalidTimeout));
    }

    #[test]
    fn poll_budget_only_matters_in_periodic_mode() {
        let cfg = SamplerConfig::new().with_max_polls(0);
        assert!(cfg.validate().is_ok());
        assert_eq!(
            cfg.with_trigger(TriggerMode::Periodic).validate(),
            Err(AdcError::InvalidPollBudget)
        );
        assert!(cfg.with_trigger(TriggerMode::Periodic).with_max_polls(1).validate().is_ok());
    }
}
