//! SPDX-License-Identifier: MIT OR Apache-2.0
//!
//! # Fast ADC
//!
//! Interrupt-driven analog sampling for small microcontrollers.
//!
//! - **Sampler:** keeps every configured channel's latest value current from
//!   the ADC interrupt, refreshing a "fast" list far more often than a "slow"
//!   one (`sampler.rs`, tier state machine in `scheduler.rs`).
//! - **Critical sections:** scoped interrupt masking that restores the prior
//!   interrupt state on every exit path (`cs.rs`).
//! - **Dispatch:** the single armed sampler the interrupt vector forwards to
//!   (`isr.rs`).
//!
//! Foreground code only reads; the interrupt handler is the sole writer, and
//! every read goes through a critical section so no value (or batch of values)
//! is observed half-updated.
//!
//! ```ignore
//! // Placed in a static before interrupts are enabled
//! let adc: &'static FastAdc<MyAdc> = ...;
//! adc.begin()?;
//!
//! loop {
//!     let v = adc.sample(0)?;
//! }
//!
//! #[interrupt]
//! fn ADC() {
//!     fast_adc::isr::dispatch();
//! }
//! ```

#![cfg_attr(not(test), no_std)]

// This mod MUST go first, so that the others see its macros.
pub(crate) mod fmt;

pub mod backend;
pub mod config;
pub mod console;
pub mod cs;
pub mod error;
pub mod isr;
pub mod record;
pub mod sampler;
pub mod scheduler;

pub use backend::AdcBackend;
pub use config::{SamplerConfig, TriggerMode, ANALOG_PIN_BASE, NUM_ANALOG_CHANNELS};
pub use cs::{CsLock, DefaultFlag, ExclusiveFlag, GlobalCs, InterruptFlag, SimFlag};
pub use error::AdcError;
pub use sampler::{FastAdc, Faults, OnUpdate, PassIndicator, Slot, Stats, UpdateHooks};
