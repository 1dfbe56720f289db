//! USB Module
//!
//! USB CDC serial link to the host. Carries the binary sample records and the
//! periodic diagnostic lines. The stack is polled from `USBCTRL_IRQ` so the
//! link stays up however busy the main loop is.

use core::cell::RefCell;
use critical_section::Mutex;
use fast_adc::console::LineSink;
use usb_device::bus::UsbBusAllocator;
use usb_device::prelude::*;
use usbd_serial::SerialPort;

use rp235x_hal as hal;
use hal::pac;

// Select appropriate interrupt macro based on chip architecture
use rp235x_hal::pac::interrupt;

type UsbBusType = hal::usb::UsbBus;

/// Device and its one CDC port. They are only ever used together.
struct UsbLink {
    device: UsbDevice<'static, UsbBusType>,
    serial: SerialPort<'static, UsbBusType>,
}

impl UsbLink {
    /// Push as much of `data` as the endpoint accepts right now.
    fn send(&mut self, mut data: &[u8]) -> usize {
        let total = data.len();
        while !data.is_empty() {
            match self.serial.write(data) {
                Ok(n) if n > 0 => data = &data[n..],
                _ => break,
            }
        }
        total - data.len()
    }
}

// Global USB link (Mutex protected for ISR access)
static USB_LINK: Mutex<RefCell<Option<UsbLink>>> = Mutex::new(RefCell::new(None));

/// Bring up the CDC device and unmask `USBCTRL_IRQ`.
///
/// Call once, before interrupts are enabled.
pub fn init(
    usb_periph: pac::USB,
    usb_dpram: pac::USB_DPRAM,
    usb_clock: hal::clocks::UsbClock,
    resets: &mut pac::RESETS,
) {
    let usb_bus = UsbBusType::new(usb_periph, usb_dpram, usb_clock, true, resets);

    // The allocator is borrowed by the device for the rest of the program
    static mut USB_BUS: Option<UsbBusAllocator<UsbBusType>> = None;
    let bus_allocator: &'static UsbBusAllocator<UsbBusType> = unsafe {
        let bus_ptr = core::ptr::addr_of_mut!(USB_BUS);
        *bus_ptr = Some(UsbBusAllocator::new(usb_bus));
        (*bus_ptr).as_ref().unwrap()
    };

    let serial = SerialPort::new(bus_allocator);
    let device = UsbDeviceBuilder::new(bus_allocator, UsbVidPid(0x16c0, 0x27dd))
        .strings(&[StringDescriptors::default()
            .manufacturer("Raspberry Pi")
            .product("Pico 2 W Fast ADC")
            .serial_number("FADC01")])
        .unwrap()
        .device_class(usbd_serial::USB_CLASS_CDC)
        .build();

    critical_section::with(|cs| {
        USB_LINK.borrow_ref_mut(cs).replace(UsbLink { device, serial });
    });

    unsafe {
        cortex_m::peripheral::NVIC::unmask(pac::Interrupt::USBCTRL_IRQ);
    }
}

/// Queue `data` for the host and return how many bytes were taken. The rest is
/// dropped; nothing here waits for the host.
pub fn write(data: &[u8]) -> usize {
    critical_section::with(|cs| {
        USB_LINK
            .borrow_ref_mut(cs)
            .as_mut()
            .map_or(0, |link| link.send(data))
    })
}

/// Debug lines over USB serial, CRLF terminated.
pub struct UsbLines;

impl LineSink for UsbLines {
    fn write_line(&mut self, line: &str) {
        // A line that didn't fit is not worth a dangling terminator
        if write(line.as_bytes()) == line.len() {
            write(b"\r\n");
        }
    }
}

#[allow(non_snake_case)]
#[interrupt]
fn USBCTRL_IRQ() {
    critical_section::with(|cs| {
        if let Some(link) = USB_LINK.borrow_ref_mut(cs).as_mut() {
            if link.device.poll(&mut [&mut link.serial]) {
                // Host input is not used; drain it
                let mut buf = [0u8; 64];
                let _ = link.serial.read(&mut buf);
            }
        }
    });
}
