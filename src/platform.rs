//! Platform collaborators the core engine is built against.
//!
//! Everything in this module is a thin trait; a board support crate
//! supplies the concrete implementation (register-level GPIO pokes, a
//! timer peripheral, an EEPROM driver, a UART, a watchdog, and a reset
//! vector). None of it is hardware-specific here — see `metta-systems-
//! vesper`'s `ConsoleOps`/`SerialOps` split for the pattern this follows.

/// The GPIB management and handshake lines a controller or device drives
/// or senses. Data is transferred separately through
/// [`GpibPins::write_data_bus`]/[`GpibPins::read_data_bus`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum GpibPin {
    Atn,
    Eoi,
    Dav,
    Nrfd,
    Ndac,
    Ifc,
    Srq,
    Ren,
}

/// Open-drain GPIB line and data-bus access.
///
/// Lines are open-drain: `drive_low` asserts (pulls the bus to logical
/// true, since GPIB is negative logic), `release` floats the line high
/// through the external pull-up. `read` reports `true` when the line is
/// released/high.
pub trait GpibPins {
    fn drive_low(&mut self, line: GpibPin);
    fn release(&mut self, line: GpibPin);
    fn read(&self, line: GpibPin) -> bool;

    /// Atomically drives all eight DIO lines with `value`. The caller has
    /// already complemented the byte to be transferred (GPIB negative
    /// logic); this trait method just places the given bit pattern.
    fn write_data_bus(&mut self, value: u8);
    /// Releases all eight DIO lines to high-impedance.
    fn release_data_bus(&mut self);
    /// Reads the raw (non-inverted) data bus value.
    fn read_data_bus(&self) -> u8;

    /// Drives TE/PE (talker enable / pin enable) so this node's byte
    /// writes actually reach the data bus.
    fn enable_talk(&mut self, enable: bool);

    /// Establishes the controller-mode bus-idle pin state (`spec.md`
    /// §4.B): SC high, DC low, ATN released, EOI/DAV/SRQ high-Z,
    /// NRFD/NDAC driven low, IFC driven high, REN driven low.
    fn init_controller_idle(&mut self);

    /// Establishes the device-mode bus-idle pin state: SC low, DC high,
    /// and every management/handshake line high-Z.
    fn init_device_idle(&mut self);
}

/// A free-running millisecond tick, incremented by a 1 ms timer interrupt.
pub trait Clock {
    fn millis(&self) -> u32;
}

/// Ten contiguous bytes of non-volatile storage (`spec.md` §3's EEPROM
/// persistence layout).
pub trait NvMemory {
    fn read_byte(&mut self, addr: u8) -> u8;
    fn write_byte(&mut self, addr: u8, value: u8);
}

/// Outbound half of the host serial link. The inbound half is the ring
/// buffer's producer API ([`crate::ring::LineRing::push_byte`]), fed
/// directly by the board's UART RX interrupt handler.
pub trait HostUart {
    fn write_byte(&mut self, byte: u8);
}

/// Must be kicked periodically or the board resets.
pub trait Watchdog {
    fn kick(&mut self);
}

/// A hard CPU reset, invoked by `+reset`/`++rst` and by unrecoverable
/// startup failures.
pub trait SystemReset {
    fn reset(&mut self) -> !;
}

/// The single error/heartbeat LED.
pub trait StatusLed {
    fn set(&mut self, on: bool);
}
