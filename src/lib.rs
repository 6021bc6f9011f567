//! Core firmware engine for a USB-to-GPIB bridge adapter.
//!
//! This crate implements the bit-banged IEEE-488 (GPIB) link layer, the
//! dual "+"/"++" command dialect interpreter, and the serial ingress ring
//! buffer that together translate line-oriented ASCII commands arriving
//! over a serial link into GPIB bus transactions.
//!
//! The crate never touches hardware directly. A board support crate
//! implements the traits in [`platform`] (GPIO, a millisecond tick, EEPROM,
//! UART, watchdog, reset, status LED) and drives [`bridge::Bridge`] from its
//! boot code, its UART RX interrupt handler, and its main loop.
#![cfg_attr(not(test), no_std)]
#![allow(clippy::upper_case_acronyms)]

pub mod bridge;
pub mod command;
pub mod config;
pub mod error;
pub mod gpib;
pub mod platform;
pub mod ring;
mod write_to;

#[cfg(test)]
pub(crate) mod testutil;

pub use bridge::Bridge;
pub use config::Config;
pub use error::Error;

/// Firmware version reported by `+ver`/`++ver`.
pub const VERSION: u32 = 5;
