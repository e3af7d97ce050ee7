//! Process-wide console channels.
//!
//! Code under test that cannot take a [`crate::TestContext`] writes through these channels instead of `println!`.
//! While an output capture scope is active, both channels land in its buffer; otherwise they reach the real
//! standard streams.

use std::fmt;
use std::io::{self, Write};

use crate::capture;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Channel {
    Stdout,
    Stderr,
}

/// `io::Write` handle for one console channel.
#[derive(Debug, Clone, Copy)]
pub struct ConsoleWriter {
    channel: Channel,
}

pub fn stdout() -> ConsoleWriter {
    ConsoleWriter {
        channel: Channel::Stdout,
    }
}

pub fn stderr() -> ConsoleWriter {
    ConsoleWriter {
        channel: Channel::Stderr,
    }
}

impl Write for ConsoleWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        if let Some(buffer) = capture::active() {
            buffer.append(&String::from_utf8_lossy(buf));
            return Ok(buf.len());
        }
        match self.channel {
            Channel::Stdout => io::stdout().write(buf),
            Channel::Stderr => io::stderr().write(buf),
        }
    }

    fn flush(&mut self) -> io::Result<()> {
        match self.channel {
            Channel::Stdout => io::stdout().flush(),
            Channel::Stderr => io::stderr().flush(),
        }
    }
}

pub(crate) fn write_stdout(text: &str) {
    let _ = stdout().write_all(text.as_bytes());
}

#[doc(hidden)]
pub fn _print(channel: Channel, args: fmt::Arguments<'_>) {
    let mut writer = ConsoleWriter { channel };
    // Console output is best effort, like `print!` without the panic.
    let _ = writer.write_fmt(args);
}

/// `println!` onto the console stdout channel.
#[macro_export]
macro_rules! test_println {
    () => {
        $crate::console::_print($crate::console::Channel::Stdout, ::std::format_args!("\n"))
    };
    ($($arg:tt)*) => {
        $crate::console::_print(
            $crate::console::Channel::Stdout,
            ::std::format_args!("{}\n", ::std::format_args!($($arg)*)),
        )
    };
}

/// `eprintln!` onto the console stderr channel.
#[macro_export]
macro_rules! test_eprintln {
    () => {
        $crate::console::_print($crate::console::Channel::Stderr, ::std::format_args!("\n"))
    };
    ($($arg:tt)*) => {
        $crate::console::_print(
            $crate::console::Channel::Stderr,
            ::std::format_args!("{}\n", ::std::format_args!($($arg)*)),
        )
    };
}
