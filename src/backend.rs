//! Hardware register interface the sampler drives.
//!
//! Implementations are called with the sampler's critical section held, from
//! both interrupt and foreground context. None of the methods may block.

/// ADC peripheral plus a free-running microsecond clock.
pub trait AdcBackend {
    /// Enable whatever interrupt ends up calling
    /// [`FastAdc::on_interrupt`](crate::FastAdc::on_interrupt).
    fn arm_trigger(&mut self);

    fn disarm_trigger(&mut self);

    /// Route the multiplexer to `channel` (a resolved channel index).
    fn select_channel(&mut self, channel: u8);

    fn start_conversion(&mut self);

    /// True once the result of the last started conversion can be read.
    fn conversion_ready(&self) -> bool;

    /// Read the finished result. Only valid after `conversion_ready`.
    fn read_conversion(&mut self) -> u16;

    /// Wrapping microsecond timestamp.
    fn now_us(&self) -> u32;
}
