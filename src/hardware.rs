//! Hardware Abstraction Module
//!
//! Brings up the RP2350 peripherals the sampler needs and implements
//! [`AdcBackend`] on top of the ADC's FIFO interrupt.

use fast_adc::AdcBackend;
use rp235x_hal as hal;
use hal::pac;

use crate::usb_module;

/// External crystal frequency used by the Raspberry Pi Pico 2 W.
const XTAL_FREQ_HZ: u32 = 12_000_000u32;

pub type LedPin = hal::gpio::Pin<
    hal::gpio::bank0::Gpio15,
    hal::gpio::FunctionSio<hal::gpio::SioOutput>,
    hal::gpio::PullDown,
>;

/// Everything `main` needs once the board is up.
pub struct Hardware {
    pub led_pin: LedPin,
    pub timer: hal::Timer<hal::timer::CopyableTimer0>,
    pub adc: Rp2350Adc,
}

/// Initializes the entire hardware stack.
///
/// 1.  Takes ownership of the raw PAC peripherals.
/// 2.  Configures the Watchdog and Clocks (System & USB).
/// 3.  Initializes the Microsecond Timer.
/// 4.  Configures the LED and the analog input pads.
/// 5.  Powers the ADC and temperature sensor (the interrupt is left to
///     [`AdcBackend::arm_trigger`]).
/// 6.  Initializes the USB Serial module.
pub fn init() -> Hardware {
    // 1. Take ownership of raw peripherals
    let mut pac = pac::Peripherals::take().unwrap();
    let mut watchdog = hal::Watchdog::new(pac.WATCHDOG);

    // 2. Configure Clocks
    let clocks = hal::clocks::init_clocks_and_plls(
        XTAL_FREQ_HZ,
        pac.XOSC,
        pac.CLOCKS,
        pac.PLL_SYS,
        pac.PLL_USB,
        &mut pac.RESETS,
        &mut watchdog,
    )
    .unwrap();

    // 3. Configure Timer (Microsecond precision)
    let timer = hal::Timer::new_timer0(pac.TIMER0, &mut pac.RESETS, &clocks);

    // 4. Configure GPIOs
    let sio = hal::Sio::new(pac.SIO);
    let pins = hal::gpio::Pins::new(
        pac.IO_BANK0,
        pac.PADS_BANK0,
        sio.gpio_bank0,
        &mut pac.RESETS,
    );

    let led_pin = pins.gpio15.into_push_pull_output();

    // Analog pads for channels 0..=2 (GPIO26..28)
    let _ain0 = hal::adc::AdcPin::new(pins.gpio26).unwrap();
    let _ain1 = hal::adc::AdcPin::new(pins.gpio27).unwrap();
    let _ain2 = hal::adc::AdcPin::new(pins.gpio28).unwrap();

    // 5. Power the ADC
    let adc = hal::Adc::new(pac.ADC, &mut pac.RESETS);

    unsafe {
        let adc_regs = &(*pac::ADC::ptr());

        // Channel Control: Enable, temperature sensor on (channel 4), Single-Shot
        adc_regs.cs().modify(|_, w| {
            w.en().set_bit()
             .ts_en().set_bit()
             .start_many().clear_bit()
        });
    }

    // 6. Configure USB Serial (via module)
    usb_module::init(
        pac.USB,
        pac.USB_DPRAM,
        clocks.usb_clock,
        &mut pac.RESETS,
    );

    Hardware {
        led_pin,
        timer,
        adc: Rp2350Adc { _adc: adc },
    }
}

/// Discard any queued conversions (clears a FIFO interrupt nobody claimed).
pub fn drain_fifo() {
    unsafe {
        let adc_regs = &(*pac::ADC::ptr());
        while adc_regs.fcs().read().level().bits() > 0 {
            let _ = adc_regs.fifo().read();
        }
    }
}

/// RP2350 ADC driven one conversion at a time through the FIFO interrupt.
pub struct Rp2350Adc {
    // Keeps the peripheral owned for as long as the sampler runs
    _adc: hal::Adc,
}

impl AdcBackend for Rp2350Adc {
    fn arm_trigger(&mut self) {
        drain_fifo();
        unsafe {
            let adc_regs = &(*pac::ADC::ptr());

            // FIFO Control: Enable, Threshold=1, No DMA
            adc_regs.fcs().modify(|_, w| {
                w.en().set_bit()
                 .thresh().bits(1)
                 .dreq_en().clear_bit()
            });

            // Enable FIFO Interrupt
            adc_regs.inte().modify(|_, w| w.fifo().set_bit());

            // Unmask ADC Interrupt in NVIC
            cortex_m::peripheral::NVIC::unmask(pac::Interrupt::ADC_IRQ_FIFO);
        }
    }

    fn disarm_trigger(&mut self) {
        cortex_m::peripheral::NVIC::mask(pac::Interrupt::ADC_IRQ_FIFO);
        unsafe {
            let adc_regs = &(*pac::ADC::ptr());
            adc_regs.inte().modify(|_, w| w.fifo().clear_bit());
        }
        drain_fifo();
    }

    fn select_channel(&mut self, channel: u8) {
        unsafe {
            let adc_regs = &(*pac::ADC::ptr());
            adc_regs.cs().modify(|_, w| w.ainsel().bits(channel));
        }
    }

    fn start_conversion(&mut self) {
        unsafe {
            let adc_regs = &(*pac::ADC::ptr());
            adc_regs.cs().modify(|_, w| w.start_once().set_bit());
        }
    }

    fn conversion_ready(&self) -> bool {
        unsafe {
            let adc_regs = &(*pac::ADC::ptr());
            adc_regs.fcs().read().level().bits() > 0
        }
    }

    fn read_conversion(&mut self) -> u16 {
        unsafe {
            let adc_regs = &(*pac::ADC::ptr());
            adc_regs.fifo().read().val().bits()
        }
    }

    fn now_us(&self) -> u32 {
        // Low word of the free-running microsecond counter
        unsafe {
            let timer_regs = &(*pac::TIMER0::ptr());
            timer_regs.timerawl().read().bits()
        }
    }
}
