//! Top-level bridge: boot sequence, main loop, and command dispatch
//! (`SPEC_FULL.md` §4.G, §4.I).
use crate::command::{self, Command, EosArg};
use crate::config::{Config, Mode};
use crate::error::{Direction, Error, Result};
use crate::gpib::device::{self, DeviceState, Event as DeviceEvent};
use crate::gpib::signals;
use crate::gpib::transaction::{self, cmd};
use crate::platform::{Clock, GpibPin, GpibPins, HostUart, NvMemory, StatusLed, SystemReset, Watchdog};
use crate::ring::LineRing;
use crate::write_to;

/// Owns every platform collaborator plus the runtime [`Config`] and
/// [`DeviceState`]; one instance per bridge, driven from the board's main
/// loop and its UART RX interrupt handler (which only ever touches the
/// [`LineRing`] passed into [`Bridge::poll`], not this type).
pub struct Bridge<P, C, M, U, W, R, L> {
    pub pins: P,
    pub clock: C,
    pub nvm: M,
    pub uart: U,
    pub watchdog: W,
    pub reset: R,
    pub led: L,
    pub cfg: Config,
    pub device: DeviceState,
}

impl<P, C, M, U, W, R, L> Bridge<P, C, M, U, W, R, L>
where
    P: GpibPins,
    C: Clock,
    M: NvMemory,
    U: HostUart,
    W: Watchdog,
    R: SystemReset,
    L: StatusLed,
{
    pub fn new(pins: P, clock: C, nvm: M, uart: U, watchdog: W, reset: R, led: L) -> Self {
        Bridge {
            pins,
            clock,
            nvm,
            uart,
            watchdog,
            reset,
            led,
            cfg: Config::defaults(),
            device: DeviceState::new(),
        }
    }

    /// Boot sequence (`SPEC_FULL.md` §4.I): load configuration, idle the
    /// bus for the configured mode, assign this node controller-in-charge
    /// if it is one, then perform the double LED blink that works around
    /// a hotplug enumeration race on the USB-serial side — kept verbatim
    /// from the reference firmware.
    pub fn boot(&mut self) {
        self.led.set(true);
        self.watchdog.kick();

        self.cfg = Config::load(&mut self.nvm);

        match self.cfg.mode {
            Mode::Controller => signals::init_controller_pins(&mut self.pins),
            Mode::Device => signals::init_device_pins(&mut self.pins),
        }

        if self.cfg.mode == Mode::Controller {
            if let Err(e) = transaction::controller_assign(&mut self.pins, &self.clock, self.cfg.timeout_ms) {
                self.log_error(e);
            }
        }

        #[cfg(feature = "defmt")]
        defmt::debug!("boot: double LED blink is an empirical USB hotplug workaround");
        for _ in 0..2 {
            self.led.set(false);
            self.watchdog.kick();
            self.led.set(true);
            self.watchdog.kick();
        }
        self.led.set(false);
    }

    /// Local observability only: independent of the host-visible debug
    /// replies (`spec.md` §7 supplement). A no-op unless the `defmt`
    /// feature is enabled.
    fn log_error(&self, err: Error) {
        #[cfg(feature = "defmt")]
        defmt::warn!("gpib transaction failed: {}", err);
        #[cfg(not(feature = "defmt"))]
        let _ = err;
    }

    /// Busy-waits roughly 1ms on `self.clock`, the short settling delay
    /// `spec.md` §7 calls for before an unrecoverable reset.
    fn settle_delay_1ms(&mut self) {
        let deadline = self.clock.millis().wrapping_add(1);
        while self.clock.millis().wrapping_sub(deadline) >= (u32::MAX / 2) {}
    }

    /// One pass of the main loop: kicks the watchdog, dispatches at most
    /// one buffered line, then services device mode if that's the
    /// current role.
    pub fn poll<const N: usize>(&mut self, ring: &LineRing<N>) {
        self.watchdog.kick();

        if ring.lines_buffered() > 0 {
            let mut line = [0u8; LineRing::<N>::MAX_LINE];
            let len = ring.dequeue_line(&mut line);
            if len > 0 {
                self.dispatch(&line[..len]);
            }
        }

        if self.cfg.mode == Mode::Device {
            self.service_device();
        }
    }

    fn service_device(&mut self) {
        let Bridge { pins, clock, cfg, device, uart, .. } = self;
        let event = device::step(pins, clock, cfg, device, |chunk: &[u8]| {
            for &b in chunk {
                uart.write_byte(b);
            }
        });
        match event {
            Ok(DeviceEvent::MessageReceived) => {
                if cfg.eot_enable {
                    uart.write_byte(cfg.eot_char);
                }
            }
            Ok(DeviceEvent::BecameTalker) if device.serial_poll_active => {
                if let Err(e) = device::send_status_byte(pins, clock, cfg, device, cfg.status_byte) {
                    self.log_error(e);
                }
            }
            Err(e) => self.log_error(e),
            _ => {}
        }
    }

    fn dispatch(&mut self, line: &[u8]) {
        if line.first() != Some(&b'+') {
            self.dispatch_passthrough(line);
            return;
        }

        match command::parse(line) {
            Some(parsed) => self.dispatch_command(parsed),
            None => {
                self.log_error(Error::UnrecognizedCommand);
                if self.cfg.debug {
                    self.reply_str(Error::UnrecognizedCommand.debug_message());
                }
            }
        }
    }

    /// A non-`+` line: in controller mode, addresses the partner as
    /// listener and writes the text as a data message; if `autoread` is
    /// set and the text contains `'?'`, immediately follows with a
    /// read-block. In device mode, the line is only ever transmitted
    /// while this node is currently addressed as talker.
    fn dispatch_passthrough(&mut self, line: &[u8]) {
        match self.cfg.mode {
            Mode::Controller => self.write_as_controller(line),
            Mode::Device => self.write_as_device(line),
        }
    }

    fn write_as_controller(&mut self, line: &[u8]) {
        let Bridge { pins, clock, cfg, .. } = self;
        let wrote = transaction::write_line(pins, clock, cfg, cfg.partner_address, line);

        match wrote {
            Ok(()) => {
                let is_query = line.contains(&b'?');
                if cfg.autoread && is_query {
                    self.perform_read(false);
                }
            }
            Err(e) => {
                self.log_error(e);
                if self.cfg.debug {
                    self.reply_str(Direction::Write.debug_message());
                }
            }
        }
    }

    fn write_as_device(&mut self, line: &[u8]) {
        if self.device.role != device::Role::Talker {
            return;
        }

        let Bridge { pins, clock, cfg, .. } = self;
        let result = transaction::write_message(pins, clock, cfg, line);
        if let Err(e) = result {
            self.log_error(e);
            if self.cfg.debug {
                self.reply_str(Direction::Write.debug_message());
            }
        }
        self.device.role = device::Role::Idle;
    }

    /// Reads from the currently addressed instrument. `force_eoi`
    /// overrides `cfg.eoi_use` for this one call (`++read eoi`).
    fn perform_read(&mut self, force_eoi: bool) {
        let mut cfg = self.cfg.clone();
        if force_eoi {
            cfg.eoi_use = true;
        }

        let Bridge { pins, clock, uart, .. } = self;
        let result = transaction::read_block(pins, clock, &cfg, cfg.partner_address, |chunk| {
            for &b in chunk {
                uart.write_byte(b);
            }
        });
        match result {
            Ok(()) => {
                if self.cfg.eot_enable {
                    self.uart.write_byte(self.cfg.eot_char);
                }
            }
            Err(e) => {
                self.log_error(e);
                if self.cfg.debug {
                    self.reply_str(Direction::Read.debug_message());
                }
            }
        }
    }

    fn dispatch_command(&mut self, command: Command) {
        match command {
            Command::Address(None) => self.reply_u32(self.cfg.partner_address as u32),
            Command::Address(Some(a)) => self.set_and_persist(|cfg| cfg.partner_address = a),
            Command::Timeout(None) => self.reply_u32(self.cfg.timeout_ms),
            Command::Timeout(Some(ms)) => self.set_and_persist(|cfg| cfg.timeout_ms = ms),
            Command::Eos(EosArg::Query(None)) => self.reply_u32(self.cfg.eos_code as u32),
            Command::Eos(EosArg::Query(Some(code))) => {
                let ok = self.cfg.set_eos_code(code);
                if ok {
                    self.persist();
                }
            }
            Command::Eos(EosArg::Custom(byte)) => self.set_and_persist(|cfg| cfg.set_custom_eos(byte)),
            Command::Eoi(None) => self.reply_bool(self.cfg.eoi_use),
            Command::Eoi(Some(v)) => self.set_and_persist(|cfg| cfg.eoi_use = v),
            Command::Mode(None) => self.reply_bool(self.cfg.mode == Mode::Controller),
            Command::Mode(Some(v)) => self.set_mode(v),
            Command::Auto(None) => self.reply_bool(self.cfg.autoread),
            Command::Auto(Some(v)) => self.set_and_persist(|cfg| cfg.autoread = v),
            Command::EotEnable(None) => self.reply_bool(self.cfg.eot_enable),
            Command::EotEnable(Some(v)) => self.set_and_persist(|cfg| cfg.eot_enable = v),
            Command::EotChar(None) => self.reply_u32(self.cfg.eot_char as u32),
            Command::EotChar(Some(b)) => self.set_and_persist(|cfg| cfg.eot_char = b),
            Command::SaveCfg(None) => self.reply_bool(self.cfg.save_cfg),
            Command::SaveCfg(Some(v)) => {
                self.cfg.save_cfg = v;
                if v {
                    self.cfg.save(&mut self.nvm);
                }
            }
            Command::ListenOnly(None) => {
                if self.cfg.mode == Mode::Device {
                    self.reply_bool(self.cfg.listen_only);
                }
            }
            Command::ListenOnly(Some(v)) => {
                if self.cfg.mode == Mode::Device {
                    self.set_and_persist(|cfg| cfg.listen_only = v);
                }
            }
            Command::Strip(None) => self.reply_u32(self.cfg.strip as u32),
            Command::Strip(Some(n)) => self.set_and_persist(|cfg| cfg.strip = n),
            Command::Test => self.reply_str("testing"),
            Command::Read { force_eoi } => {
                if self.cfg.mode == Mode::Controller {
                    self.perform_read(force_eoi);
                }
            }
            Command::Clear => {
                if self.cfg.mode == Mode::Controller {
                    self.addressed_command(cmd::SDC);
                }
            }
            Command::Local => {
                if self.cfg.mode == Mode::Controller {
                    self.addressed_command(cmd::GTL);
                }
            }
            Command::LocalLockout => {
                if self.cfg.mode == Mode::Controller {
                    self.addressed_command(cmd::LLO);
                }
            }
            Command::Trigger => {
                if self.cfg.mode == Mode::Controller {
                    self.addressed_command(cmd::GET);
                }
            }
            Command::InterfaceClear => {
                if self.cfg.mode == Mode::Controller {
                    transaction::pulse_ifc(&mut self.pins);
                }
            }
            Command::SerialPoll => {
                if self.cfg.mode == Mode::Controller {
                    self.do_serial_poll();
                }
            }
            Command::QuerySrq => {
                if self.cfg.mode == Mode::Controller {
                    let asserted = !self.pins.read(GpibPin::Srq);
                    self.reply_bool(asserted);
                }
            }
            Command::Status(None) => {
                if self.cfg.mode == Mode::Device {
                    self.reply_u32(self.cfg.status_byte as u32);
                }
            }
            Command::Status(Some(b)) => {
                if self.cfg.mode == Mode::Device {
                    self.cfg.status_byte = b;
                }
            }
            Command::Reset => {
                self.watchdog.kick();
                self.settle_delay_1ms();
                self.reset.reset();
            }
            Command::Version { long: false } => self.reply_u32(crate::VERSION),
            Command::Version { long: true } => {
                let mut buf = [0u8; 24];
                if let Ok(s) = write_to::show(&mut buf, format_args!("Version {}.0", crate::VERSION)) {
                    let text = s;
                    self.reply_bytes(text.as_bytes());
                }
            }
            Command::Debug(None) => self.reply_bool(self.cfg.debug),
            Command::Debug(Some(v)) => self.cfg.debug = v,
        }
    }

    fn set_mode(&mut self, controller: bool) {
        self.cfg.mode = if controller { Mode::Controller } else { Mode::Device };
        self.cfg.maybe_persist(&mut self.nvm);
        match self.cfg.mode {
            Mode::Controller => {
                signals::init_controller_pins(&mut self.pins);
                let _ = transaction::controller_assign(&mut self.pins, &self.clock, self.cfg.timeout_ms);
            }
            Mode::Device => {
                signals::init_device_pins(&mut self.pins);
                self.device = DeviceState::new();
            }
        }
    }

    fn do_serial_poll(&mut self) {
        let Bridge { pins, clock, cfg, .. } = self;
        match transaction::serial_poll(pins, clock, cfg, cfg.partner_address) {
            Ok(status) => self.reply_u32(status as u32),
            Err(e) => {
                self.log_error(e);
                if self.cfg.debug {
                    self.reply_str(Direction::Read.debug_message());
                }
            }
        }
    }

    fn addressed_command(&mut self, byte: u8) {
        let Bridge { pins, clock, cfg, .. } = self;
        let result: Result<()> = (|| {
            transaction::address_target_as_listener(pins, clock, cfg.timeout_ms, cfg.my_address, cfg.partner_address)?;
            transaction::send_command_byte(pins, clock, cfg.timeout_ms, byte)?;
            transaction::unaddress_all(pins, clock, cfg.timeout_ms)
        })();
        if let Err(e) = result {
            self.log_error(e);
            if self.cfg.debug {
                self.reply_str(Direction::Write.debug_message());
            }
        }
    }

    fn set_and_persist(&mut self, set: impl FnOnce(&mut Config)) {
        set(&mut self.cfg);
        self.persist();
    }

    fn persist(&mut self) {
        self.cfg.maybe_persist(&mut self.nvm);
    }

    fn reply_bytes(&mut self, bytes: &[u8]) {
        for &b in bytes {
            self.uart.write_byte(b);
        }
        if self.cfg.eot_enable {
            self.uart.write_byte(self.cfg.eot_char);
        }
    }

    fn reply_str(&mut self, s: &str) {
        self.reply_bytes(s.as_bytes());
    }

    fn reply_u32(&mut self, v: u32) {
        let mut buf = [0u8; 12];
        if let Ok(s) = write_to::show(&mut buf, format_args!("{}", v)) {
            let len = s.len();
            let mut owned = [0u8; 12];
            owned[..len].copy_from_slice(s.as_bytes());
            self.reply_bytes(&owned[..len]);
        }
    }

    fn reply_bool(&mut self, v: bool) {
        self.reply_u32(v as u32);
    }
}
