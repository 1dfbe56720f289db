//! SPDX-License-Identifier: MIT OR Apache-2.0
//!
//! # Fast ADC Demo Firmware
//!
//! Samples two fast channels (GPIO26/27) and two slow ones (GPIO28 and the
//! on-die temperature sensor) from the ADC FIFO interrupt, and streams the fast
//! pair to the host as binary capture records over USB serial.
//!
//! - **Hardware Module:** board bring-up and the ADC backend (`hardware.rs`).
//! - **USB Module:** serial link to the host (`usb_module.rs`).
//! - **Sampler:** the `fast_adc` library, armed on `ADC_IRQ_FIFO`.
//!
//! Target: Raspberry Pi Pico 2 W (RP2350).

#![no_std]
#![no_main]

// --- Imports ---
use defmt::*;
use defmt_rtt as _;
use fast_adc::record::SampleRecord;
use fast_adc::{isr, sout, FastAdc, PassIndicator};
use panic_probe as _;

// --- Modules ---
mod hardware;
mod usb_module;

use hardware::{LedPin, Rp2350Adc};
use usb_module::UsbLines;

// --- HAL Selection ---
use rp235x_hal as hal;
use hal::entry;

// Select appropriate interrupt macro based on chip architecture
use rp235x_hal::pac::interrupt;

// --- Bootloader Configuration ---

#[unsafe(link_section = ".start_block")]
#[used]
pub static IMAGE_DEF: hal::block::ImageDef = hal::block::ImageDef::secure_exe();

// --- Sampling Plan ---

const FAST_CHANNELS: [u8; 2] = [0, 1];
/// GPIO28 and the temperature sensor
const SLOW_CHANNELS: [u8; 2] = [2, 4];

/// LED toggles every this many fast passes.
const LED_DIVIDER: u32 = 10_000;

const RECORD_PERIOD_US: u64 = 10_000;
const REPORT_PERIOD_US: u64 = 1_000_000;

// Default flag: the HAL's critical section, which also holds off core 1
type BoardAdc = FastAdc<Rp2350Adc, PassIndicator<LedPin>>;

/// Entry point.
#[entry]
fn main() -> ! {
    info!("Program start");

    // 1. Initialize Hardware Stack (Clocks, GPIO, Timer, ADC, USB)
    let hw = hardware::init();

    // 2. Build the sampler
    let hooks = PassIndicator::new(hw.led_pin, LED_DIVIDER);
    let adc = unwrap!(FastAdc::with_hooks(hw.adc, hooks, &FAST_CHANNELS, &SLOW_CHANNELS));

    // 3. Give it a static home so the interrupt can reach it.
    // Safety: written once here, before the ADC interrupt is unmasked.
    static mut SAMPLER: Option<BoardAdc> = None;
    let sampler: &'static BoardAdc = unsafe {
        let ptr = core::ptr::addr_of_mut!(SAMPLER);
        *ptr = Some(adc);
        (*ptr).as_ref().unwrap()
    };

    // 4. Arm the ADC interrupt
    unwrap!(sampler.begin());

    let mut usb = UsbLines;
    let mut last_record = hw.timer.get_counter();
    let mut last_report = last_record;

    // 5. Main Application Loop
    loop {
        let now = hw.timer.get_counter();

        // Periodic Task: stream the fast pair
        if now.ticks().saturating_sub(last_record.ticks()) >= RECORD_PERIOD_US {
            last_record = now;

            let mut fast = [0u16; 2];
            if sampler.get_samples(&mut fast).is_ok() {
                let record = SampleRecord::new(now.ticks() as u32, fast[0], fast[1]);
                usb_module::write(&record.encode());
            }
        }

        // Periodic Task: diagnostics
        if now.ticks().saturating_sub(last_report.ticks()) >= REPORT_PERIOD_US {
            last_report = now;

            if sampler.poll_stall() {
                warn!("ADC conversion stalled");
            }
            let faults = sampler.take_faults();
            if faults.any() {
                sout!(&mut usb, "faults: {:?}", faults);
            }

            let line = sampler.report();
            info!("{=str}", line.as_str());
            sout!(&mut usb, "{}", line);
        }
    }
}

// --- Interrupt Handlers ---

#[allow(non_snake_case)]
#[interrupt]
fn ADC_IRQ_FIFO() {
    if !isr::dispatch() {
        hardware::drain_fifo();
    }
}

// --- Metadata ---

#[unsafe(link_section = ".bi_entries")]
#[used]
pub static PICOTOOL_ENTRIES: [hal::binary_info::EntryAddr; 4] = [
    hal::binary_info::rp_cargo_bin_name!(),
    hal::binary_info::rp_cargo_version!(),
    hal::binary_info::rp_program_description!(c"Fast ADC Sampler"),
    hal::binary_info::rp_program_build_attribute!()
];
