//! Crate-wide error taxonomy.
//!
//! Mirrors the error surface described for the link engine and command
//! interpreter: a handshake timeout, a mid-addressing protocol failure, and
//! an unrecognised parser input. There is exactly one enum instead of the
//! distinct sentinel bytes (`0xff`) the reference firmware returned from
//! `_gpib_write`/`gpib_receive`, threaded the same way through every
//! fallible call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Error {
    /// A handshake edge (NDAC/NRFD/DAV) was not observed within the
    /// configured timeout.
    Timeout,
    /// A command-byte write used to address the bus timed out; any
    /// in-progress read/write was aborted and bus state was reset to idle.
    AddressingFailed,
    /// The parser did not recognise a `'+'`-prefixed command.
    UnrecognizedCommand,
}

pub type Result<T> = core::result::Result<T, Error>;

/// Which direction a bus transfer was going when it failed. Selects between
/// the two host-visible debug strings below — the text itself is kept
/// verbatim from the reference firmware for compatibility with existing
/// host-side tooling.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Read,
    Write,
}

impl Direction {
    pub fn debug_message(self) -> &'static str {
        match self {
            Direction::Read => "Read error occured.",
            Direction::Write => "Write error occured.",
        }
    }
}

impl Error {
    /// The exact host-visible text for `Error::UnrecognizedCommand`; the
    /// `Timeout`/`AddressingFailed` variants are reported via
    /// [`Direction::debug_message`] since the same error can occur on
    /// either a read or a write.
    pub fn debug_message(self) -> &'static str {
        match self {
            Error::Timeout | Error::AddressingFailed => "error occured.",
            Error::UnrecognizedCommand => "Unrecognized command.",
        }
    }
}

impl core::fmt::Display for Error {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.debug_message())
    }
}
