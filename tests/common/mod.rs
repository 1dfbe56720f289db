//! Shared test fixtures: a scripted ADC backend and recording hooks.

#![allow(dead_code)]

use std::cell::Cell;
use std::sync::{Arc, Mutex};

use fast_adc::{AdcBackend, Slot, UpdateHooks};

/// Simulated ADC.
///
/// Conversion `n` (1-based, counted across all channels) yields `n` unless a
/// custom `value_for` is set. The clock advances by `tick_us` on every read.
pub struct SimAdc {
    pub armed: bool,
    pub arm_count: u32,
    pub selected: Option<u8>,
    pub conversions: u32,
    pub started: Vec<u8>,
    pub pending: Option<u16>,
    /// Conversions never finish
    pub stuck: bool,
    pub value_for: fn(u8, u32) -> u16,
    pub tick_us: u32,
    now: Cell<u32>,
}

impl SimAdc {
    pub fn new() -> Self {
        Self {
            armed: false,
            arm_count: 0,
            selected: None,
            conversions: 0,
            started: Vec::new(),
            pending: None,
            stuck: false,
            value_for: |_, n| n as u16,
            tick_us: 1,
            now: Cell::new(0),
        }
    }

    pub fn with_tick(mut self, tick_us: u32) -> Self {
        self.tick_us = tick_us;
        self
    }

    pub fn stuck(mut self) -> Self {
        self.stuck = true;
        self
    }

    pub fn advance(&mut self, us: u32) {
        self.now.set(self.now.get().wrapping_add(us));
    }
}

impl AdcBackend for SimAdc {
    fn arm_trigger(&mut self) {
        self.armed = true;
        self.arm_count += 1;
    }

    fn disarm_trigger(&mut self) {
        self.armed = false;
    }

    fn select_channel(&mut self, channel: u8) {
        self.selected = Some(channel);
    }

    fn start_conversion(&mut self) {
        let channel = self.selected.expect("conversion started without a channel");
        self.conversions += 1;
        self.started.push(channel);
        self.pending = Some((self.value_for)(channel, self.conversions));
    }

    fn conversion_ready(&self) -> bool {
        self.pending.is_some() && !self.stuck
    }

    fn read_conversion(&mut self) -> u16 {
        self.pending.take().unwrap_or(0)
    }

    fn now_us(&self) -> u32 {
        let t = self.now.get().wrapping_add(self.tick_us);
        self.now.set(t);
        t
    }
}

#[derive(Debug, Default)]
pub struct HookLog {
    pub fast: u32,
    pub slow: u32,
    /// Slot values seen by each fast notification
    pub fast_snapshots: Vec<Vec<u16>>,
}

/// Hooks that record into a shared log the test keeps a handle to.
#[derive(Clone, Default)]
pub struct RecordingHooks {
    pub log: Arc<Mutex<HookLog>>,
}

impl RecordingHooks {
    pub fn fast_count(&self) -> u32 {
        self.log.lock().unwrap().fast
    }

    pub fn slow_count(&self) -> u32 {
        self.log.lock().unwrap().slow
    }

    pub fn last_fast_snapshot(&self) -> Option<Vec<u16>> {
        self.log.lock().unwrap().fast_snapshots.last().cloned()
    }
}

impl UpdateHooks for RecordingHooks {
    fn on_fast_update(&mut self, samples: &[Slot]) {
        let mut log = self.log.lock().unwrap();
        log.fast += 1;
        log.fast_snapshots
            .push(samples.iter().map(|s| s.value).collect());
    }

    fn on_slow_update(&mut self, _samples: &[Slot]) {
        self.log.lock().unwrap().slow += 1;
    }
}

/// Run the interrupt handler `n` times.
pub fn fire<A, H, F>(adc: &fast_adc::FastAdc<A, H, F>, n: usize)
where
    A: AdcBackend,
    H: UpdateHooks,
    F: fast_adc::InterruptFlag,
{
    for _ in 0..n {
        adc.on_interrupt();
    }
}
