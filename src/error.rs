//! Error types for sampler configuration and access.
//!
//! Interrupt-context faults are not errors in this sense: they can't be
//! returned to anyone, so they are counted in [`Faults`](crate::Faults) and
//! drained by foreground code.

use core::fmt;

/// Sampler error type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum AdcError {
    /// The fast list must name at least one channel
    EmptyFastList,

    /// A channel list is longer than the board has channels
    TooManyChannels {
        /// Length of the offending list
        len: usize,
        /// Board channel count
        max: usize,
    },

    /// Identifier is neither a channel index nor an analog pin number
    ChannelOutOfRange(u8),

    /// Channel listed more than once (in either list)
    DuplicateChannel(u8),

    /// `fast_passes_per_slow` was zero
    InvalidInterleave,

    /// `conversion_timeout_us` was zero
    InvalidTimeout,

    /// Periodic trigger with `max_polls` of zero
    InvalidPollBudget,

    /// Channel is valid but in neither list
    ChannelNotSampled(u8),

    /// Copy request exceeds the board channel count
    CountTooLarge {
        /// Entries requested
        requested: usize,
        /// Board channel count
        max: usize,
    },

    /// A different sampler already owns the interrupt
    AlreadyArmed,
}

impl fmt::Display for AdcError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AdcError::EmptyFastList => write!(f, "Fast channel list is empty"),
            AdcError::TooManyChannels { len, max } => {
                write!(f, "Channel list has {} entries, board has {}", len, max)
            }
            AdcError::ChannelOutOfRange(id) => write!(f, "Channel {} out of range", id),
            AdcError::DuplicateChannel(ch) => write!(f, "Channel {} listed twice", ch),
            AdcError::InvalidInterleave => write!(f, "Fast passes per slow advance must be >= 1"),
            AdcError::InvalidTimeout => write!(f, "Conversion timeout must be >= 1us"),
            AdcError::InvalidPollBudget => write!(f, "Periodic mode needs at least one poll"),
            AdcError::ChannelNotSampled(ch) => write!(f, "Channel {} is not sampled", ch),
            AdcError::CountTooLarge { requested, max } => {
                write!(f, "Requested {} samples, board has {}", requested, max)
            }
            AdcError::AlreadyArmed => write!(f, "Another sampler is already armed"),
        }
    }
}

impl core::error::Error for AdcError {}
