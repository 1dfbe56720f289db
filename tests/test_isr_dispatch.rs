//! Interrupt dispatch through the global armed-sampler slot.
//!
//! The slot is process-wide, so the whole lifecycle lives in one test to keep
//! parallel test threads from racing on it.

mod common;

use common::{RecordingHooks, SimAdc};
use fast_adc::{isr, AdcError, FastAdc};

fn leaked(fast: &[u8]) -> (&'static FastAdc<SimAdc, RecordingHooks>, RecordingHooks) {
    let hooks = RecordingHooks::default();
    let adc = FastAdc::with_hooks(SimAdc::new(), hooks.clone(), fast, &[]).unwrap();
    (Box::leak(Box::new(adc)), hooks)
}

#[test]
fn test_armed_sampler_lifecycle() {
    let (first, first_hooks) = leaked(&[0, 1]);
    let (second, _) = leaked(&[2]);

    // Nothing armed yet
    assert!(!isr::is_armed());
    assert!(!isr::dispatch());

    // begin arms and starts; a second begin on the same sampler is a no-op
    first.begin().unwrap();
    first.begin().unwrap();
    assert!(isr::is_armed());
    assert!(first.is_started());
    first.with_backend(|b| assert_eq!(b.arm_count, 1));

    // Only one sampler may own the interrupt
    assert_eq!(second.begin(), Err(AdcError::AlreadyArmed));
    assert!(!second.is_started());

    // Vector -> dispatch -> armed sampler
    assert!(isr::dispatch());
    assert!(isr::dispatch());
    assert_eq!(first.sample(0), Ok(1));
    assert_eq!(first.sample(1), Ok(2));
    assert_eq!(first_hooks.fast_count(), 1);

    // Ending a sampler that isn't armed leaves the slot alone
    second.end();
    assert!(isr::is_armed());

    first.end();
    assert!(!isr::is_armed());
    assert!(!isr::dispatch());
    assert!(!first.is_started());

    // The slot is free again
    second.begin().unwrap();
    assert!(isr::dispatch());
    assert_eq!(second.sample(2), Ok(1));
    second.end();
    assert!(!isr::is_armed());
}
