//! The GPIB link layer: signal-line idle states, byte-level handshake,
//! bus transactions, and the device-mode state machine (`spec.md` §4.B-E).
pub mod device;
pub mod link;
pub mod signals;
pub mod transaction;
