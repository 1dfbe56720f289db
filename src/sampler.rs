//! # Fast ADC Sampler
//!
//! Keeps a bank of analog channel values up to date from interrupt context.
//! Channels on the fast list are refreshed on every pass; channels on the slow
//! list are worked in one at a time between fast passes (see
//! [`SamplerConfig::fast_passes_per_slow`]).
//!
//! All state the interrupt handler touches lives in one cell that can only be
//! borrowed while a [`CsLock`] on the sampler's interrupt flag is held.
//! Foreground reads therefore always see the slots as they were between two
//! handler invocations, never halfway through one. A sampler is shareable with
//! an interrupt handler (`Sync`) only when its flag is an [`ExclusiveFlag`].

use core::fmt::Write as _;

use embedded_hal::digital::OutputPin;
use heapless::Vec;

use crate::backend::AdcBackend;
use crate::config::{resolve_channel, SamplerConfig, TriggerMode, NUM_ANALOG_CHANNELS};
use crate::console::{self, Line};
use crate::cs::{CsLock, DefaultFlag, ExclusiveFlag, Guarded, InterruptFlag};
use crate::error::AdcError;
use crate::isr::{self, InterruptTarget};
use crate::scheduler::{ChannelList, Schedule, TierEvent, TierFsm};

/// Most recent sample of one channel.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Slot {
    /// Zero until the first conversion lands.
    pub value: u16,
    /// Backend timestamp of the last write, `None` if never sampled.
    pub updated_at_us: Option<u32>,
}

impl Slot {
    pub const UNSAMPLED: Slot = Slot {
        value: 0,
        updated_at_us: None,
    };

    pub fn is_sampled(&self) -> bool {
        self.updated_at_us.is_some()
    }

    /// Microseconds since the last write as of `now_us`.
    pub fn age_us(&self, now_us: u32) -> Option<u32> {
        self.updated_at_us.map(|t| now_us.wrapping_sub(t))
    }
}

/// Fault counters recorded from interrupt context.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Faults {
    /// Periodic mode: conversion never became ready; slot left untouched
    pub timeouts: u16,
    /// Conversion took longer than the timeout but was still stored
    pub slow_conversions: u16,
    /// Interrupt with no finished conversion to collect
    pub spurious: u16,
    /// In-flight conversion found stuck by [`FastAdc::poll_stall`]
    pub stalls: u16,
}

impl Faults {
    pub fn any(&self) -> bool {
        *self != Faults::default()
    }
}

/// Pass counters.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Stats {
    pub conversions: u32,
    pub fast_passes: u32,
    pub slow_passes: u32,
}

/// Notifications fired from the interrupt handler.
///
/// Both run in interrupt context with the sampler state borrowed: keep them
/// short, never block, and don't call back into the sampler (that borrow
/// panics).
pub trait UpdateHooks {
    /// Every channel on the fast list has been converted once more.
    fn on_fast_update(&mut self, _samples: &[Slot]) {}

    /// Every channel on the slow list has been converted once more.
    fn on_slow_update(&mut self, _samples: &[Slot]) {}
}

impl UpdateHooks for () {}

/// Hooks from a pair of closures.
pub struct OnUpdate<Ff, Fs> {
    fast: Ff,
    slow: Fs,
}

impl<Ff, Fs> OnUpdate<Ff, Fs>
where
    Ff: FnMut(&[Slot]),
    Fs: FnMut(&[Slot]),
{
    pub fn new(fast: Ff, slow: Fs) -> Self {
        Self { fast, slow }
    }
}

impl<Ff, Fs> UpdateHooks for OnUpdate<Ff, Fs>
where
    Ff: FnMut(&[Slot]),
    Fs: FnMut(&[Slot]),
{
    fn on_fast_update(&mut self, samples: &[Slot]) {
        (self.fast)(samples)
    }

    fn on_slow_update(&mut self, samples: &[Slot]) {
        (self.slow)(samples)
    }
}

/// Toggles a pin every `divider` fast passes, so the fast-pass rate can be
/// read off a scope or an LED.
pub struct PassIndicator<P> {
    pin: P,
    divider: u32,
    count: u32,
    high: bool,
}

impl<P: OutputPin> PassIndicator<P> {
    pub fn new(pin: P, divider: u32) -> Self {
        Self {
            pin,
            divider: divider.max(1),
            count: 0,
            high: false,
        }
    }

    pub fn is_high(&self) -> bool {
        self.high
    }

    pub fn release(self) -> P {
        self.pin
    }
}

impl<P: OutputPin> UpdateHooks for PassIndicator<P> {
    fn on_fast_update(&mut self, _samples: &[Slot]) {
        self.count += 1;
        if self.count < self.divider {
            return;
        }
        self.count = 0;
        self.high = !self.high;
        let _ = if self.high {
            self.pin.set_high()
        } else {
            self.pin.set_low()
        };
    }
}

#[derive(Clone, Copy, Debug)]
struct InFlight {
    channel: u8,
    started_us: u32,
}

/// Everything shared between the handler and foreground code.
struct Engine<A, H> {
    backend: A,
    hooks: H,
    fsm: TierFsm,
    schedule: Schedule,
    slots: [Slot; NUM_ANALOG_CHANNELS],
    in_flight: Option<InFlight>,
    started: bool,
    isr_time_us: u32,
    adc_time_us: u32,
    faults: Faults,
    stats: Stats,
}

impl<A: AdcBackend, H: UpdateHooks> Engine<A, H> {
    /// Program the mux for the scheduled channel and kick off a conversion.
    fn launch(&mut self) {
        let Some(channel) = self.schedule.current(&self.fsm) else {
            return;
        };
        self.backend.select_channel(channel);
        self.backend.start_conversion();
        self.in_flight = Some(InFlight {
            channel,
            started_us: self.backend.now_us(),
        });
    }

    fn store(&mut self, channel: u8, value: u16, now_us: u32) {
        self.slots[channel as usize] = Slot {
            value,
            updated_at_us: Some(now_us),
        };
        self.stats.conversions = self.stats.conversions.wrapping_add(1);
    }

    /// Advance the tier FSM, returning which passes just finished.
    fn advance(&mut self) -> (bool, bool) {
        self.fsm.dispatch(&mut self.schedule, &TierEvent::Converted);
        let done = self.schedule.take_completed();
        if done.fast {
            self.stats.fast_passes = self.stats.fast_passes.wrapping_add(1);
        }
        if done.slow {
            self.stats.slow_passes = self.stats.slow_passes.wrapping_add(1);
        }
        (done.fast, done.slow)
    }

    fn notify(&mut self, fast: bool, slow: bool) {
        let Engine { hooks, slots, .. } = self;
        if fast {
            hooks.on_fast_update(&slots[..]);
        }
        if slow {
            hooks.on_slow_update(&slots[..]);
        }
    }

    /// Conversion-complete interrupt: collect the result, start the next one.
    fn collect_and_relaunch(&mut self, timeout_us: u32) {
        let Some(flight) = self.in_flight else {
            bump(&mut self.faults.spurious);
            return;
        };
        if !self.backend.conversion_ready() {
            bump(&mut self.faults.spurious);
            return;
        }
        self.in_flight = None;

        let value = self.backend.read_conversion();
        let now = self.backend.now_us();
        self.adc_time_us = now.wrapping_sub(flight.started_us);
        if self.adc_time_us > timeout_us {
            bump(&mut self.faults.slow_conversions);
        }
        self.store(flight.channel, value, now);

        let (fast, slow) = self.advance();
        self.launch();
        self.notify(fast, slow);
    }

    /// Periodic interrupt: convert the scheduled channel start to finish.
    fn convert_polled(&mut self, timeout_us: u32, max_polls: u32) {
        self.launch();
        let Some(flight) = self.in_flight.take() else {
            return;
        };

        let mut ready = false;
        for _ in 0..max_polls {
            if self.backend.conversion_ready() {
                ready = true;
                break;
            }
            if self.backend.now_us().wrapping_sub(flight.started_us) > timeout_us {
                break;
            }
        }

        let now = self.backend.now_us();
        self.adc_time_us = now.wrapping_sub(flight.started_us);
        if ready {
            let value = self.backend.read_conversion();
            self.store(flight.channel, value, now);
        } else {
            bump(&mut self.faults.timeouts);
        }

        let (fast, slow) = self.advance();
        self.notify(fast, slow);
    }
}

#[inline]
fn bump(counter: &mut u16) {
    *counter = counter.saturating_add(1);
}

/// Interrupt-driven two-tier ADC sampler.
///
/// `A` is the hardware, `H` the pass notifications, `F` the interrupt flag
/// guarding shared state.
pub struct FastAdc<A, H = (), F = DefaultFlag> {
    config: SamplerConfig,
    flag: F,
    engine: Guarded<Engine<A, H>, F>,
}

impl<A: AdcBackend> FastAdc<A> {
    /// Sampler with no hooks, the default flag and the default config.
    pub fn new(backend: A, fast: &[u8], slow: &[u8]) -> Result<Self, AdcError> {
        Self::from_parts(backend, (), DefaultFlag::default(), fast, slow, SamplerConfig::default())
    }
}

impl<A: AdcBackend, H: UpdateHooks> FastAdc<A, H> {
    pub fn with_hooks(backend: A, hooks: H, fast: &[u8], slow: &[u8]) -> Result<Self, AdcError> {
        Self::from_parts(backend, hooks, DefaultFlag::default(), fast, slow, SamplerConfig::default())
    }
}

impl<A, H, F> FastAdc<A, H, F>
where
    A: AdcBackend,
    H: UpdateHooks,
    F: InterruptFlag,
{
    /// Validate both lists and build the sampler. Nothing is armed yet.
    ///
    /// List entries are channel indices or analog pin numbers (see
    /// [`resolve_channel`]). Fails if the fast list is empty, a list is longer
    /// than the board, an entry doesn't resolve, a channel appears twice, or
    /// `config` is out of range.
    pub fn from_parts(
        backend: A,
        hooks: H,
        flag: F,
        fast: &[u8],
        slow: &[u8],
        config: SamplerConfig,
    ) -> Result<Self, AdcError> {
        config.validate()?;
        if fast.is_empty() {
            warn!("fast list is empty");
            return Err(AdcError::EmptyFastList);
        }

        let mut seen = [false; NUM_ANALOG_CHANNELS];
        let fast_list = build_list(fast, &mut seen)?;
        let slow_list = build_list(slow, &mut seen)?;

        let mut schedule = Schedule::new(fast_list, slow_list, config.fast_passes_per_slow);
        let mut fsm = TierFsm::Idle;
        fsm.init(&mut schedule);

        debug!(
            "sampler: {} fast, {} slow channels",
            schedule.fast().len(),
            schedule.slow().len()
        );

        Ok(Self {
            config,
            flag,
            engine: Guarded::new(Engine {
                backend,
                hooks,
                fsm,
                schedule,
                slots: [Slot::UNSAMPLED; NUM_ANALOG_CHANNELS],
                in_flight: None,
                started: false,
                isr_time_us: 0,
                adc_time_us: 0,
                faults: Faults::default(),
                stats: Stats::default(),
            }),
        })
    }

    /// Run `f` on the engine with interrupts masked.
    fn locked<R>(&self, f: impl FnOnce(&mut Engine<A, H>) -> R) -> R {
        let lock = CsLock::acquire(&self.flag);
        let mut engine = self.engine.borrow_mut(&lock);
        f(&mut engine)
    }

    pub fn config(&self) -> &SamplerConfig {
        &self.config
    }

    /// The interrupt flag guarding this sampler.
    pub fn flag(&self) -> &F {
        &self.flag
    }

    /// Arm the hardware trigger and begin sampling at the top of the fast
    /// list. Calling it again while running does nothing.
    pub fn start(&self) {
        let trigger = self.config.trigger;
        let first = self.locked(|e| {
            if e.started {
                return None;
            }
            e.started = true;
            e.fsm.dispatch(&mut e.schedule, &TierEvent::Start);
            e.backend.arm_trigger();
            if trigger == TriggerMode::ConversionComplete {
                e.launch();
            }
            e.schedule.current(&e.fsm)
        });
        if let Some(channel) = first {
            info!("sampling started at channel {}", channel);
        }
    }

    /// Disarm the trigger and stop sampling. Samples are kept; a later
    /// [`start`](Self::start) begins again at the top of the fast list.
    pub fn end(&self) {
        let was_started = self.locked(|e| {
            let was_started = e.started;
            e.backend.disarm_trigger();
            e.fsm.dispatch(&mut e.schedule, &TierEvent::Stop);
            e.in_flight = None;
            e.started = false;
            was_started
        });
        if isr::unregister(self.as_ptr()) {
            debug!("sampler disarmed");
        }
        if was_started {
            info!("sampling stopped");
        }
    }

    pub fn is_started(&self) -> bool {
        self.locked(|e| e.started)
    }

    /// Interrupt entry point. Route the ADC (or timer) interrupt here, either
    /// directly or through [`isr::dispatch`].
    ///
    /// # Panics
    ///
    /// If re-entered, including from a hook. That is an interrupt priority
    /// misconfiguration, not a recoverable condition.
    pub fn on_interrupt(&self) {
        let timeout_us = self.config.conversion_timeout_us;
        let trigger = self.config.trigger;
        let max_polls = self.config.max_polls;

        self.locked(|e| {
            if !e.started {
                return;
            }
            let entered = e.backend.now_us();
            match trigger {
                TriggerMode::ConversionComplete => e.collect_and_relaunch(timeout_us),
                TriggerMode::Periodic => e.convert_polled(timeout_us, max_polls),
            }
            e.isr_time_us = e.backend.now_us().wrapping_sub(entered);
        });
    }

    /// Last value of a sampled channel; zero until its first conversion.
    pub fn sample(&self, channel: u8) -> Result<u16, AdcError> {
        self.slot(channel).map(|s| s.value)
    }

    /// Last value and timestamp of a sampled channel.
    pub fn slot(&self, channel: u8) -> Result<Slot, AdcError> {
        let ch = resolve_channel(channel)?;
        self.locked(|e| {
            if e.schedule.contains(ch) {
                Ok(e.slots[ch as usize])
            } else {
                Err(AdcError::ChannelNotSampled(channel))
            }
        })
    }

    /// Copy `buf.len()` values, starting at channel 0, from a single handler
    /// state. Channels that aren't sampled read as zero.
    pub fn get_samples(&self, buf: &mut [u16]) -> Result<(), AdcError> {
        if buf.len() > NUM_ANALOG_CHANNELS {
            return Err(AdcError::CountTooLarge {
                requested: buf.len(),
                max: NUM_ANALOG_CHANNELS,
            });
        }
        self.locked(|e| {
            for (out, slot) in buf.iter_mut().zip(e.slots.iter()) {
                *out = slot.value;
            }
        });
        Ok(())
    }

    /// Duration of the last handler invocation in microseconds.
    pub fn isr_time(&self) -> u32 {
        self.locked(|e| e.isr_time_us)
    }

    /// Duration of the last conversion in microseconds.
    pub fn adc_time(&self) -> u32 {
        self.locked(|e| e.adc_time_us)
    }

    pub fn faults(&self) -> Faults {
        self.locked(|e| e.faults)
    }

    /// Read and clear the fault counters.
    pub fn take_faults(&self) -> Faults {
        let faults = self.locked(|e| core::mem::take(&mut e.faults));
        if faults.any() {
            warn!(
                "adc faults: {} timeouts, {} slow, {} spurious, {} stalls",
                faults.timeouts,
                faults.slow_conversions,
                faults.spurious,
                faults.stalls
            );
        }
        faults
    }

    pub fn stats(&self) -> Stats {
        self.locked(|e| e.stats)
    }

    /// Foreground watchdog for conversion-complete mode. If the in-flight
    /// conversion has been pending longer than the timeout, count a stall and
    /// start it again. Returns whether a stall was found.
    pub fn poll_stall(&self) -> bool {
        let timeout_us = self.config.conversion_timeout_us;
        let stalled = self.locked(|e| {
            let Some(flight) = e.in_flight else {
                return None;
            };
            if !e.started || e.backend.conversion_ready() {
                return None;
            }
            if e.backend.now_us().wrapping_sub(flight.started_us) <= timeout_us {
                return None;
            }
            bump(&mut e.faults.stalls);
            e.launch();
            Some(flight.channel)
        });
        if let Some(channel) = stalled {
            warn!("conversion on channel {} stalled, restarted", channel);
        }
        stalled.is_some()
    }

    /// One debug line summarising timings, pass counts and faults. Foreground
    /// only; formatting is not interrupt-safe.
    pub fn report(&self) -> Line {
        let (isr_us, adc_us, stats, faults) =
            self.locked(|e| (e.isr_time_us, e.adc_time_us, e.stats, e.faults));
        let mut line = Line::new();
        let _ = write!(
            console::Truncate(&mut line),
            "isr={}us adc={}us conv={} fast={} slow={} timeouts={} slowconv={} spurious={} stalls={}",
            isr_us,
            adc_us,
            stats.conversions,
            stats.fast_passes,
            stats.slow_passes,
            faults.timeouts,
            faults.slow_conversions,
            faults.spurious,
            faults.stalls
        );
        line
    }

    /// Guarded access to the owned backend.
    pub fn with_backend<R>(&self, f: impl FnOnce(&mut A) -> R) -> R {
        self.locked(|e| f(&mut e.backend))
    }

    fn as_ptr(&self) -> *const () {
        self as *const Self as *const ()
    }
}

impl<A, H, F> FastAdc<A, H, F>
where
    A: AdcBackend + Send + 'static,
    H: UpdateHooks + Send + 'static,
    F: ExclusiveFlag + Sync + 'static,
{
    /// Make this the sampler [`isr::dispatch`] calls, then [`start`](Self::start).
    ///
    /// Calling it again on the armed sampler is a no-op. Fails if a different
    /// sampler is armed; [`end`](Self::end) that one first.
    pub fn begin(&'static self) -> Result<(), AdcError> {
        isr::register(self)?;
        self.start();
        Ok(())
    }
}

impl<A, H, F> InterruptTarget for FastAdc<A, H, F>
where
    A: AdcBackend + Send,
    H: UpdateHooks + Send,
    F: ExclusiveFlag + Sync,
{
    fn on_interrupt(&self) {
        FastAdc::on_interrupt(self)
    }

    fn id(&self) -> *const () {
        self.as_ptr()
    }
}

fn build_list(ids: &[u8], seen: &mut [bool; NUM_ANALOG_CHANNELS]) -> Result<ChannelList, AdcError> {
    if ids.len() > NUM_ANALOG_CHANNELS {
        warn!("channel list too long: {}", ids.len());
        return Err(AdcError::TooManyChannels {
            len: ids.len(),
            max: NUM_ANALOG_CHANNELS,
        });
    }
    let mut list = Vec::new();
    for &id in ids {
        let ch = resolve_channel(id)?;
        if seen[ch as usize] {
            warn!("channel {} listed twice", ch);
            return Err(AdcError::DuplicateChannel(ch));
        }
        seen[ch as usize] = true;
        // Length checked above
        let _ = list.push(ch);
    }
    Ok(list)
}
