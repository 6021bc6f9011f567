//! Byte-level IEEE-488 handshake (`SPEC_FULL.md` §4.C).
//!
//! Everything here operates on one byte at a time; callers needing
//! multi-byte semantics (addressing, block reads, EOS-terminated writes)
//! live one layer up in [`crate::gpib::transaction`].
use crate::error::{Error, Result};
use crate::platform::{Clock, GpibPin, GpibPins};

/// Polls `cond` until it becomes true or `timeout_ms` elapses. `timeout_ms
/// == 0` means poll forever (used by `receive_byte` in device mode, which
/// has no deadline of its own — the caller bounds it another way).
fn wait_until<C: Clock>(clock: &C, timeout_ms: u32, mut cond: impl FnMut() -> bool) -> Result<()> {
    let deadline = clock.millis().wrapping_add(timeout_ms);
    loop {
        if cond() {
            return Ok(());
        }
        if timeout_ms == 0 {
            continue;
        }
        let now = clock.millis();
        if now.wrapping_sub(deadline) < (u32::MAX / 2) {
            return Err(Error::Timeout);
        }
    }
}

/// Per-byte write modifiers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WriteOptions {
    /// Assert ATN for the duration of this byte (it is a command byte,
    /// not data).
    pub attention: bool,
    /// Assert EOI alongside this byte (the last byte of a data message
    /// when `eoi_use` is enabled).
    pub use_eoi: bool,
}

impl WriteOptions {
    pub fn data(use_eoi: bool) -> Self {
        WriteOptions {
            attention: false,
            use_eoi,
        }
    }

    pub fn command() -> Self {
        WriteOptions {
            attention: true,
            use_eoi: false,
        }
    }
}

/// Writes one byte to the bus per the three-wire handshake, complementing
/// it first (GPIB DIO lines are negative logic).
///
/// 1. Wait for NRFD released and NDAC low (every listener ready, none
///    still holding the previous byte).
/// 2. Drive ATN low if `opts.attention`.
/// 3. Place `!byte` on the data bus and enable the talker.
/// 4. Assert EOI if `opts.use_eoi`.
/// 5. Assert DAV.
/// 6. Wait for NDAC released (every listener has accepted), then release
///    DAV, EOI, and the data bus, and disable the talker.
///
/// On timeout the bus is left exactly as the reference firmware leaves
/// it: DAV, EOI, and the data bus released, talker disabled, NRFD/NDAC
/// untouched, so the caller can decide whether to re-idle the whole bus.
pub fn write_byte<P: GpibPins, C: Clock>(
    pins: &mut P,
    clock: &C,
    timeout_ms: u32,
    byte: u8,
    opts: WriteOptions,
) -> Result<()> {
    wait_until(clock, timeout_ms, || {
        pins.read(GpibPin::Nrfd) && !pins.read(GpibPin::Ndac)
    })?;

    if opts.attention {
        pins.drive_low(GpibPin::Atn);
    }

    pins.enable_talk(true);
    pins.write_data_bus(!byte);

    if opts.use_eoi {
        pins.drive_low(GpibPin::Eoi);
    }

    pins.drive_low(GpibPin::Dav);

    let accepted = wait_until(clock, timeout_ms, || pins.read(GpibPin::Ndac));

    pins.release(GpibPin::Dav);
    pins.release(GpibPin::Eoi);
    pins.release_data_bus();
    pins.enable_talk(false);
    if opts.attention {
        pins.release(GpibPin::Atn);
    }

    accepted
}

/// Writes every byte of `bytes` with `opts`, asserting EOI (if
/// `opts.use_eoi`) only on the final byte.
pub fn write_bytes<P: GpibPins, C: Clock>(
    pins: &mut P,
    clock: &C,
    timeout_ms: u32,
    bytes: &[u8],
    opts: WriteOptions,
) -> Result<()> {
    let last = bytes.len().saturating_sub(1);
    for (i, &byte) in bytes.iter().enumerate() {
        let byte_opts = WriteOptions {
            attention: opts.attention,
            use_eoi: opts.use_eoi && i == last,
        };
        write_byte(pins, clock, timeout_ms, byte, byte_opts)?;
    }
    Ok(())
}

/// Receives one byte from the bus, returning `(byte, eoi_asserted)`.
///
/// 1. Release NRFD, drive NDAC low (not yet accepted), release DAV.
/// 2. Wait for DAV asserted (talker has data ready).
/// 3. Drive NRFD low (freeze: stop accepting further data while we read),
///    read the data bus and EOI, complementing the data byte back.
/// 4. Release NDAC (accept).
/// 5. Wait for DAV released, then drive NDAC low again, ready for the
///    next byte.
pub fn receive_byte<P: GpibPins, C: Clock>(pins: &mut P, clock: &C, timeout_ms: u32) -> Result<(u8, bool)> {
    pins.release(GpibPin::Nrfd);
    pins.release(GpibPin::Dav);
    pins.drive_low(GpibPin::Ndac);

    wait_until(clock, timeout_ms, || !pins.read(GpibPin::Dav))?;

    pins.drive_low(GpibPin::Nrfd);
    let byte = !pins.read_data_bus();
    let eoi = !pins.read(GpibPin::Eoi);

    pins.release(GpibPin::Ndac);

    wait_until(clock, timeout_ms, || pins.read(GpibPin::Dav))?;

    pins.drive_low(GpibPin::Ndac);

    Ok((byte, eoi))
}
