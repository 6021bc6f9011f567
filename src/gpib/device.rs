//! Device-mode bus participation (`SPEC_FULL.md` §4.E): this node answers
//! a controller instead of driving the bus itself. Every command/address
//! byte arrives the same way a listener receives any other byte — under
//! ATN — so device mode reuses [`crate::gpib::link::receive_byte`] rather
//! than a parallel receive path.
use crate::config::Config;
use crate::error::Result;
use crate::gpib::link::{self, WriteOptions};
use crate::gpib::transaction::{self, cmd};
use crate::platform::{Clock, GpibPin, GpibPins};

/// What this node was last told to do by the controller's addressing
/// sequence.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Role {
    Idle,
    Listener,
    Talker,
}

/// Device-mode session state, carried across repeated [`step`] calls from
/// the bridge's main loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct DeviceState {
    pub role: Role,
    pub remote: bool,
    pub locked_out: bool,
    pub serial_poll_active: bool,
    pub triggered: bool,
}

impl DeviceState {
    pub fn new() -> Self {
        DeviceState {
            role: Role::Idle,
            remote: false,
            locked_out: false,
            serial_poll_active: false,
            triggered: false,
        }
    }
}

impl Default for DeviceState {
    fn default() -> Self {
        Self::new()
    }
}

/// What a service pass found, for the bridge to act on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Event {
    /// Nothing to do: ATN was released, or the byte received didn't
    /// change what this node should do next.
    None,
    /// This node was just addressed as listener; the caller should now
    /// receive a data message with [`crate::gpib::link::receive_byte`]
    /// in a loop (not this module's job — device mode hands raw bytes to
    /// the bridge the same way controller mode does).
    BecameListener,
    /// This node was just addressed as talker; the caller should send
    /// its next outbound message, or, if `state.serial_poll_active`, a
    /// single status byte instead.
    BecameTalker,
    /// `GET` was received while this node was addressed: the caller
    /// should perform its device-specific trigger action.
    Triggered,
    /// `DCL` (every device) or `SDC` (this device specifically, while
    /// addressed) was received: the caller should clear to its
    /// power-on state.
    Cleared,
    /// ATN was released while this node was addressed as listener: a
    /// full data message was just received and forwarded byte-by-byte
    /// through `step`'s `forward` callback. `state.role` has already
    /// reverted to `Idle`.
    MessageReceived,
}

/// Services one command/address byte if the controller has ATN
/// asserted; if ATN is released and this node is the addressed
/// listener, receives a full data message instead (driving NDAC low and
/// forwarding each chunk through `forward`, respecting `cfg.eoi_use`).
/// A no-op otherwise. Call this every main-loop pass while in device
/// mode.
pub fn step<P: GpibPins, C: Clock>(
    pins: &mut P,
    clock: &C,
    cfg: &Config,
    state: &mut DeviceState,
    forward: impl FnMut(&[u8]),
) -> Result<Event> {
    if pins.read(GpibPin::Atn) {
        if state.role == Role::Listener {
            transaction::receive_message(pins, clock, cfg, forward)?;
            state.role = Role::Idle;
            return Ok(Event::MessageReceived);
        }
        return Ok(Event::None);
    }

    let (byte, _eoi) = link::receive_byte(pins, clock, cfg.timeout_ms)?;

    let listen_addr = cmd::listen_address(cfg.my_address);
    let talk_addr = cmd::talk_address(cfg.my_address);

    let event = match byte {
        cmd::UNL if state.role == Role::Listener => {
            state.role = Role::Idle;
            Event::None
        }
        cmd::UNT if state.role == Role::Talker => {
            state.role = Role::Idle;
            Event::None
        }
        cmd::DCL => {
            *state = DeviceState::new();
            Event::Cleared
        }
        cmd::SDC if state.role != Role::Idle => {
            state.remote = false;
            Event::Cleared
        }
        cmd::LLO => {
            state.locked_out = true;
            Event::None
        }
        cmd::GTL if state.role != Role::Idle => {
            state.locked_out = false;
            Event::None
        }
        cmd::GET if state.role != Role::Idle => {
            state.triggered = true;
            Event::Triggered
        }
        cmd::SPE => {
            state.serial_poll_active = true;
            Event::None
        }
        cmd::SPD => {
            state.serial_poll_active = false;
            Event::None
        }
        b if b == listen_addr => {
            state.role = Role::Listener;
            Event::BecameListener
        }
        b if b == talk_addr => {
            state.role = Role::Talker;
            Event::BecameTalker
        }
        _ => Event::None,
    };

    Ok(event)
}

/// Sends `status_byte` as this node's serial-poll response, then clears
/// `state.serial_poll_active` (the controller's `SPD` has not necessarily
/// arrived yet, but this node has nothing further to say until polled
/// again).
pub fn send_status_byte<P: GpibPins, C: Clock>(
    pins: &mut P,
    clock: &C,
    cfg: &Config,
    state: &mut DeviceState,
    status_byte: u8,
) -> Result<()> {
    link::write_byte(pins, clock, cfg.timeout_ms, status_byte, WriteOptions::data(true))?;
    state.serial_poll_active = false;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::testutil::{MockClock, SimPins};

    fn test_config() -> Config {
        let mut cfg = Config::defaults();
        cfg.my_address = 3;
        cfg
    }

    fn assert_addressed(byte: u8, cfg: &Config, expected: Event) {
        let mut pins = SimPins::new();
        let clock = MockClock::new();
        let mut state = DeviceState::new();

        pins.drive_low(GpibPin::Atn);
        pins.queue_read(&[byte], false);

        let event = step(&mut pins, &clock, cfg, &mut state, |_: &[u8]| {}).unwrap();
        assert_eq!(event, expected);
    }

    #[test]
    fn my_listen_address_becomes_listener() {
        let cfg = test_config();
        assert_addressed(cmd::listen_address(cfg.my_address), &cfg, Event::BecameListener);
    }

    #[test]
    fn my_talk_address_becomes_talker() {
        let cfg = test_config();
        assert_addressed(cmd::talk_address(cfg.my_address), &cfg, Event::BecameTalker);
    }

    #[test]
    fn unrelated_address_is_ignored() {
        let cfg = test_config();
        assert_addressed(cmd::listen_address(cfg.my_address + 1), &cfg, Event::None);
    }

    #[test]
    fn atn_released_services_nothing_when_not_addressed_listener() {
        let mut pins = SimPins::new();
        let clock = MockClock::new();
        let cfg = test_config();
        let mut state = DeviceState::new();

        let event = step(&mut pins, &clock, &cfg, &mut state, |_: &[u8]| {}).unwrap();
        assert_eq!(event, Event::None);
    }

    #[test]
    fn atn_released_while_listener_receives_and_forwards_message() {
        let mut pins = SimPins::new();
        let clock = MockClock::new();
        let cfg = test_config();
        let mut state = DeviceState::new();
        state.role = Role::Listener;

        pins.queue_read(b"HI", true);

        let mut forwarded: std::vec::Vec<u8> = std::vec::Vec::new();
        let event = step(&mut pins, &clock, &cfg, &mut state, |chunk: &[u8]| {
            forwarded.extend_from_slice(chunk);
        })
        .unwrap();

        assert_eq!(event, Event::MessageReceived);
        assert_eq!(forwarded, b"HI");
        assert_eq!(state.role, Role::Idle);
    }

    #[test]
    fn dcl_resets_full_state() {
        let cfg = test_config();
        let mut pins = SimPins::new();
        let clock = MockClock::new();
        let mut state = DeviceState::new();
        state.role = Role::Listener;
        state.locked_out = true;

        pins.drive_low(GpibPin::Atn);
        pins.queue_read(&[cmd::DCL], false);
        let event = step(&mut pins, &clock, &cfg, &mut state, |_: &[u8]| {}).unwrap();

        assert_eq!(event, Event::Cleared);
        assert_eq!(state, DeviceState::new());
    }

    #[test]
    fn get_while_addressed_reports_triggered() {
        let cfg = test_config();
        let mut pins = SimPins::new();
        let clock = MockClock::new();
        let mut state = DeviceState::new();
        state.role = Role::Listener;

        pins.drive_low(GpibPin::Atn);
        pins.queue_read(&[cmd::GET], false);
        let event = step(&mut pins, &clock, &cfg, &mut state, |_: &[u8]| {}).unwrap();

        assert_eq!(event, Event::Triggered);
        assert!(state.triggered);
    }
}
