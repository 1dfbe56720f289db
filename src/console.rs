//! Debug line output.
//!
//! A bounded, best-effort text sink for foreground diagnostics. Lines are
//! formatted into a fixed buffer and silently cut at [`LINE_CAPACITY`].
//! Formatting is not bounded-time, so none of this is called from interrupt
//! context.

use core::fmt::{self, Write};

pub const LINE_CAPACITY: usize = 128;

pub type Line = heapless::String<LINE_CAPACITY>;

/// Destination for debug lines (USB serial, UART, RTT...).
///
/// Fire-and-forget: implementations drop output rather than block.
pub trait LineSink {
    /// Write one line. `line` carries no terminator.
    fn write_line(&mut self, line: &str);
}

/// `fmt::Write` adapter that keeps whatever fits and drops the rest.
pub struct Truncate<'a>(pub &'a mut Line);

impl Write for Truncate<'_> {
    fn write_str(&mut self, s: &str) -> fmt::Result {
        for c in s.chars() {
            if self.0.push(c).is_err() {
                break;
            }
        }
        Ok(())
    }
}

pub fn format_line(args: fmt::Arguments<'_>) -> Line {
    let mut line = Line::new();
    let _ = Truncate(&mut line).write_fmt(args);
    line
}

pub fn write_line<S: LineSink + ?Sized>(sink: &mut S, args: fmt::Arguments<'_>) {
    sink.write_line(&format_line(args));
}

/// Formatted debug line: `sout!(sink, "adc={}", v)`.
#[macro_export]
macro_rules! sout {
    ($sink:expr, $($arg:tt)*) => {
        $crate::console::write_line($sink, format_args!($($arg)*))
    };
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::string::{String, ToString};
    use std::vec::Vec;

    #[derive(Default)]
    struct Capture(Vec<String>);

    impl LineSink for Capture {
        fn write_line(&mut self, line: &str) {
            self.0.push(line.to_string());
        }
    }

    #[test]
    fn formats_arguments() {
        let line = format_line(format_args!("ch{}={}", 3, 512));
        assert_eq!(line.as_str(), "ch3=512");
    }

    #[test]
    fn long_lines_are_truncated_at_capacity() {
        let long = "x".repeat(200);
        let line = format_line(format_args!("{}", long));
        assert_eq!(line.len(), LINE_CAPACITY);
    }

    #[test]
    fn sout_writes_to_sink() {
        let mut sink = Capture::default();
        crate::sout!(&mut sink, "isr={}us", 12);
        crate::sout!(&mut sink, "done");
        assert_eq!(sink.0, ["isr=12us", "done"]);
    }
}
