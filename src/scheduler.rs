//! Tier scheduling state machine.
//!
//! Decides which channel is converted next. The fast list is walked
//! round-robin; after `passes_per_slow` completed fast passes one slow-list
//! channel is serviced, then the fast list resumes where it left off.

use heapless::Vec;
use typed_fsm::{state_machine, Transition};

use crate::config::NUM_ANALOG_CHANNELS;

pub type ChannelList = Vec<u8, NUM_ANALOG_CHANNELS>;

/// Passes finished by the last `Converted` event.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Completed {
    pub fast: bool,
    pub slow: bool,
}

// FSM Context
pub struct Schedule {
    fast: ChannelList,
    slow: ChannelList,
    fast_cursor: usize,
    slow_cursor: usize,
    passes_since_slow: u8,
    passes_per_slow: u8,
    completed: Completed,
}

impl Schedule {
    /// Lists must already be validated: `fast` non-empty, `passes_per_slow >= 1`.
    pub fn new(fast: ChannelList, slow: ChannelList, passes_per_slow: u8) -> Self {
        Self {
            fast,
            slow,
            fast_cursor: 0,
            slow_cursor: 0,
            passes_since_slow: 0,
            passes_per_slow,
            completed: Completed::default(),
        }
    }

    pub fn fast(&self) -> &[u8] {
        &self.fast
    }

    pub fn slow(&self) -> &[u8] {
        &self.slow
    }

    pub fn contains(&self, channel: u8) -> bool {
        self.fast.contains(&channel) || self.slow.contains(&channel)
    }

    /// Channel the active tier services next, `None` while idle.
    pub fn current(&self, fsm: &TierFsm) -> Option<u8> {
        match fsm {
            TierFsm::Idle => None,
            TierFsm::Fast => self.fast.get(self.fast_cursor).copied(),
            TierFsm::Slow => self.slow.get(self.slow_cursor).copied(),
        }
    }

    /// Passes completed since the last call.
    pub fn take_completed(&mut self) -> Completed {
        core::mem::take(&mut self.completed)
    }

    fn rewind(&mut self) {
        self.fast_cursor = 0;
        self.slow_cursor = 0;
        self.passes_since_slow = 0;
        self.completed = Completed::default();
    }

    /// Step the fast cursor. Returns true when a slow channel is due.
    fn advance_fast(&mut self) -> bool {
        self.fast_cursor += 1;
        if self.fast_cursor < self.fast.len() {
            return false;
        }
        self.fast_cursor = 0;
        self.completed.fast = true;
        if self.slow.is_empty() {
            return false;
        }
        self.passes_since_slow += 1;
        if self.passes_since_slow >= self.passes_per_slow {
            self.passes_since_slow = 0;
            true
        } else {
            false
        }
    }

    fn advance_slow(&mut self) {
        self.slow_cursor += 1;
        if self.slow_cursor >= self.slow.len() {
            self.slow_cursor = 0;
            self.completed.slow = true;
        }
    }
}

// FSM Events
#[derive(Clone, Copy, Debug)]
pub enum TierEvent {
    Start,
    Converted,
    Stop,
}

// State Machine Definition
state_machine! {
    Name: TierFsm,
    Context: Schedule,
    Event: TierEvent,
    States: {
        // Not sampling; cursors rewound
        Idle => {
            entry: |ctx| {
                ctx.rewind();
            }
            process: |_ctx, evt| {
                match evt {
                    TierEvent::Start => Transition::To(TierFsm::Fast),
                    TierEvent::Converted | TierEvent::Stop => Transition::None,
                }
            }
        },

        // Servicing the fast list
        Fast => {
            entry: |_ctx| {}
            process: |ctx, evt| {
                match evt {
                    TierEvent::Converted => {
                        if ctx.advance_fast() {
                            Transition::To(TierFsm::Slow)
                        } else {
                            Transition::None
                        }
                    }
                    TierEvent::Stop => Transition::To(TierFsm::Idle),
                    TierEvent::Start => Transition::None,
                }
            }
        },

        // One slow-list channel, then straight back to the fast list
        Slow => {
            entry: |_ctx| {}
            process: |ctx, evt| {
                match evt {
                    TierEvent::Converted => {
                        ctx.advance_slow();
                        Transition::To(TierFsm::Fast)
                    }
                    TierEvent::Stop => Transition::To(TierFsm::Idle),
                    TierEvent::Start => Transition::None,
                }
            }
        }
    }
}
