//! Host-side mocks of every platform trait, used only by `#[cfg(test)]`
//! unit tests across the crate (`SPEC_FULL.md` §2 "Test tooling").
//!
//! [`SimPins`] is a small reactive simulation of "whatever is on the other
//! end of the bus": it reacts to the handshake transitions the core
//! produces the way a real listener/talker would, so the same line-level
//! protocol code under test (`gpib::link`, `gpib::transaction`) can be
//! exercised without real hardware. It is deliberately simplified — the
//! simulated peer reacts the instant the relevant line changes rather than
//! after a realistic number of polls — since the properties under test are
//! protocol correctness, not handshake timing.
use core::cell::{Cell, RefCell};
use heapless::Vec;

use crate::platform::{Clock, GpibPin, GpibPins, HostUart, NvMemory, StatusLed, SystemReset, Watchdog};

#[derive(Clone, Copy)]
struct Lines {
    atn: bool,
    eoi: bool,
    dav: bool,
    nrfd: bool,
    ndac: bool,
    ifc: bool,
    srq: bool,
    ren: bool,
    dio: u8,
}

impl Lines {
    fn idle() -> Self {
        Lines {
            atn: true,
            eoi: true,
            dav: true,
            nrfd: true,
            ndac: false,
            ifc: true,
            srq: true,
            ren: true,
            dio: 0,
        }
    }

    fn get(&self, line: GpibPin) -> bool {
        match line {
            GpibPin::Atn => self.atn,
            GpibPin::Eoi => self.eoi,
            GpibPin::Dav => self.dav,
            GpibPin::Nrfd => self.nrfd,
            GpibPin::Ndac => self.ndac,
            GpibPin::Ifc => self.ifc,
            GpibPin::Srq => self.srq,
            GpibPin::Ren => self.ren,
        }
    }

    fn set(&mut self, line: GpibPin, value: bool) {
        match line {
            GpibPin::Atn => self.atn = value,
            GpibPin::Eoi => self.eoi = value,
            GpibPin::Dav => self.dav = value,
            GpibPin::Nrfd => self.nrfd = value,
            GpibPin::Ndac => self.ndac = value,
            GpibPin::Ifc => self.ifc = value,
            GpibPin::Srq => self.srq = value,
            GpibPin::Ren => self.ren = value,
        }
    }
}

/// A simulated peer on the other end of the bus, combining a reactive
/// listener (for bytes the core under test writes) and a reactive talker
/// (for bytes queued up for the core under test to receive).
pub struct SimPins {
    lines: RefCell<Lines>,
    /// Bytes captured at the instant DAV fell while this mock played
    /// listener — the value on the (already-inverted) data bus at that
    /// moment, for asserting testable property 1.
    pub captured_writes: RefCell<Vec<u8, 32>>,
    /// Bytes (and their EOI assertion) queued up to play back as talker,
    /// front to back.
    talker_queue: RefCell<Vec<(u8, bool), 32>>,
}

impl SimPins {
    pub fn new() -> Self {
        SimPins {
            lines: RefCell::new(Lines::idle()),
            captured_writes: RefCell::new(Vec::new()),
            talker_queue: RefCell::new(Vec::new()),
        }
    }

    /// Queues bytes (with an EOI flag on the last one) for the core under
    /// test to read back via [`crate::gpib::link::receive_byte`].
    pub fn queue_read(&self, bytes: &[u8], eoi_on_last: bool) {
        let mut q = self.talker_queue.borrow_mut();
        for (i, &b) in bytes.iter().enumerate() {
            let eoi = eoi_on_last && i == bytes.len() - 1;
            q.push((b, eoi)).ok();
        }
    }

    pub fn srq_set(&self, asserted: bool) {
        self.lines.borrow_mut().srq = !asserted;
    }
}

impl Default for SimPins {
    fn default() -> Self {
        Self::new()
    }
}

impl GpibPins for SimPins {
    fn drive_low(&mut self, line: GpibPin) {
        let mut l = self.lines.borrow_mut();
        l.set(line, false);
        if line == GpibPin::Dav {
            // Reacting as listener: capture the byte on the bus and
            // acknowledge it.
            let byte = l.dio;
            drop(l);
            self.captured_writes.borrow_mut().push(byte).ok();
            self.lines.borrow_mut().ndac = true;
        } else if line == GpibPin::Ndac {
            // Reacting as talker: present the next queued byte, if any.
            if let Some((byte, eoi)) = pop_front(&mut self.talker_queue.borrow_mut()) {
                l.dio = !byte;
                l.eoi = !eoi;
                l.dav = false;
            }
        }
    }

    fn release(&mut self, line: GpibPin) {
        let mut l = self.lines.borrow_mut();
        l.set(line, true);
        if line == GpibPin::Ndac {
            // Reacting as talker: the core accepted the byte, so the
            // simulated talker releases DAV.
            l.dav = true;
        } else if line == GpibPin::Dav {
            // Reacting as listener: the core stopped holding DAV low, so
            // the simulated listener resets NDAC low, ready for the next
            // byte.
            l.ndac = false;
        }
    }

    fn read(&self, line: GpibPin) -> bool {
        self.lines.borrow().get(line)
    }

    fn write_data_bus(&mut self, value: u8) {
        self.lines.borrow_mut().dio = value;
    }

    fn release_data_bus(&mut self) {}

    fn read_data_bus(&self) -> u8 {
        self.lines.borrow().dio
    }

    fn enable_talk(&mut self, _enable: bool) {}

    fn init_controller_idle(&mut self) {
        *self.lines.borrow_mut() = Lines::idle();
    }

    fn init_device_idle(&mut self) {
        *self.lines.borrow_mut() = Lines::idle();
    }
}

fn pop_front<const N: usize>(v: &mut Vec<(u8, bool), N>) -> Option<(u8, bool)> {
    if v.is_empty() {
        return None;
    }
    let item = v[0];
    v.remove(0);
    Some(item)
}

/// A millisecond clock the test advances explicitly.
pub struct MockClock {
    now: Cell<u32>,
}

impl MockClock {
    pub fn new() -> Self {
        MockClock { now: Cell::new(0) }
    }

    pub fn advance(&self, ms: u32) {
        self.now.set(self.now.get().wrapping_add(ms));
    }
}

impl Default for MockClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for MockClock {
    fn millis(&self) -> u32 {
        self.now.set(self.now.get().wrapping_add(1));
        self.now.get()
    }
}

/// A 16-byte in-memory stand-in for EEPROM (only the first 10 bytes are
/// ever touched by [`crate::config::Config`]).
pub struct MockNvMemory {
    bytes: [u8; 16],
}

impl MockNvMemory {
    pub fn new() -> Self {
        MockNvMemory { bytes: [0; 16] }
    }
}

impl Default for MockNvMemory {
    fn default() -> Self {
        Self::new()
    }
}

impl NvMemory for MockNvMemory {
    fn read_byte(&mut self, addr: u8) -> u8 {
        self.bytes[addr as usize]
    }

    fn write_byte(&mut self, addr: u8, value: u8) {
        self.bytes[addr as usize] = value;
    }
}

/// Records every byte written to the host, as a stand-in UART TX.
pub struct RecordingUart {
    pub written: RefCell<Vec<u8, 256>>,
}

impl RecordingUart {
    pub fn new() -> Self {
        RecordingUart {
            written: RefCell::new(Vec::new()),
        }
    }

    pub fn as_bytes(&self) -> Vec<u8, 256> {
        self.written.borrow().clone()
    }
}

impl Default for RecordingUart {
    fn default() -> Self {
        Self::new()
    }
}

impl HostUart for RecordingUart {
    fn write_byte(&mut self, byte: u8) {
        self.written.borrow_mut().push(byte).ok();
    }
}

/// Counts watchdog kicks without doing anything else.
pub struct CountingWatchdog {
    pub kicks: Cell<u32>,
}

impl CountingWatchdog {
    pub fn new() -> Self {
        CountingWatchdog { kicks: Cell::new(0) }
    }
}

impl Default for CountingWatchdog {
    fn default() -> Self {
        Self::new()
    }
}

impl Watchdog for CountingWatchdog {
    fn kick(&mut self) {
        self.kicks.set(self.kicks.get() + 1);
    }
}

/// Records whether a reset was requested; panics instead of diverging so
/// tests can observe that it happened.
pub struct TrackingReset {
    pub requested: Cell<bool>,
}

impl TrackingReset {
    pub fn new() -> Self {
        TrackingReset {
            requested: Cell::new(false),
        }
    }
}

impl Default for TrackingReset {
    fn default() -> Self {
        Self::new()
    }
}

impl SystemReset for TrackingReset {
    fn reset(&mut self) -> ! {
        self.requested.set(true);
        panic!("simulated reset requested");
    }
}

/// Tracks the LED's last commanded state.
pub struct MockLed {
    pub on: Cell<bool>,
}

impl MockLed {
    pub fn new() -> Self {
        MockLed { on: Cell::new(false) }
    }
}

impl Default for MockLed {
    fn default() -> Self {
        Self::new()
    }
}

impl StatusLed for MockLed {
    fn set(&mut self, on: bool) {
        self.on.set(on);
    }
}
