//! Runtime configuration and its EEPROM persistence (`spec.md` §3, §4.H).
use crate::platform::NvMemory;

/// Controller vs. device operating mode.
///
/// Encoded with `Controller = 1` / `Device = 0` to match the EEPROM default
/// record (`spec.md` §4.H lists the virgin-EEPROM default as `mode=1`,
/// and `spec.md` §3 says that default is controller mode).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Mode {
    Device = 0,
    Controller = 1,
}

impl Mode {
    fn from_byte(b: u8) -> Mode {
        match b {
            0 => Mode::Device,
            _ => Mode::Controller,
        }
    }
}

/// End-of-string terminator selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum EosCode {
    CrLf = 0,
    Cr = 1,
    Lf = 2,
    None = 3,
    Custom = 4,
}

impl EosCode {
    fn from_byte(b: u8) -> EosCode {
        match b {
            0 => EosCode::CrLf,
            1 => EosCode::Cr,
            2 => EosCode::Lf,
            3 => EosCode::None,
            4 => EosCode::Custom,
            _ => EosCode::CrLf,
        }
    }

    /// `++eos` query/set code space is 0..=3; `CUSTOM` is only reachable
    /// via `+eos:N` and is not itself a settable `++eos` argument.
    fn from_query_code(b: u8) -> Option<EosCode> {
        match b {
            0 => Some(EosCode::CrLf),
            1 => Some(EosCode::Cr),
            2 => Some(EosCode::Lf),
            3 => Some(EosCode::None),
            _ => None,
        }
    }
}

/// EEPROM byte offsets (`spec.md` §3).
mod layout {
    pub const SENTINEL: u8 = 0x00;
    pub const MODE: u8 = 0x01;
    pub const PARTNER_ADDRESS: u8 = 0x02;
    pub const EOT_CHAR: u8 = 0x03;
    pub const EOT_ENABLE: u8 = 0x04;
    pub const EOS_CODE: u8 = 0x05;
    pub const EOI_USE: u8 = 0x06;
    pub const AUTOREAD: u8 = 0x07;
    pub const LISTEN_ONLY: u8 = 0x08;
    pub const SAVE_CFG: u8 = 0x09;
}

/// Validity sentinel distinguishing a previously-configured EEPROM from
/// virgin hardware.
pub const SENTINEL_VALUE: u8 = 0xAA;

/// Runtime configuration record (`spec.md` §3).
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Config {
    pub mode: Mode,
    pub partner_address: u8,
    pub my_address: u8,
    pub eoi_use: bool,
    pub eos_code: EosCode,
    pub eos_byte: u8,
    pub strip: u8,
    pub autoread: bool,
    pub eot_enable: bool,
    pub eot_char: u8,
    pub listen_only: bool,
    pub timeout_ms: u32,
    pub debug: bool,
    pub save_cfg: bool,
    pub status_byte: u8,
}

impl Config {
    /// Field values written to a virgin EEPROM (`spec.md` §4.H).
    pub fn defaults() -> Config {
        let mut cfg = Config {
            mode: Mode::Controller,
            partner_address: 1,
            my_address: 0,
            eoi_use: true,
            eos_code: EosCode::None,
            eos_byte: 0,
            strip: 0,
            autoread: true,
            eot_enable: true,
            eot_char: 13,
            listen_only: false,
            timeout_ms: 1000,
            debug: false,
            save_cfg: true,
            status_byte: 0,
        };
        cfg.derive_eos();
        cfg
    }

    /// Recomputes `eos_byte` from `eos_code`. `CUSTOM` is left untouched —
    /// its byte is set directly by `+eos:N`.
    fn derive_eos(&mut self) {
        self.eos_byte = match self.eos_code {
            EosCode::CrLf => b'\n',
            EosCode::Cr => b'\r',
            EosCode::Lf => b'\n',
            EosCode::None => 0,
            EosCode::Custom => self.eos_byte,
        };
    }

    /// The EOS string appended on write / matched on read. `CrLf` is the
    /// only multi-byte terminator.
    pub fn eos_string(&self) -> &'static [u8] {
        match self.eos_code {
            EosCode::CrLf => b"\r\n",
            EosCode::Cr => b"\r",
            EosCode::Lf => b"\n",
            EosCode::None => b"",
            EosCode::Custom => &[],
        }
    }

    /// Loads configuration from EEPROM, seeding defaults on virgin
    /// hardware (`spec.md` §4.H).
    pub fn load(nvm: &mut impl NvMemory) -> Config {
        if nvm.read_byte(layout::SENTINEL) != SENTINEL_VALUE {
            let cfg = Config::defaults();
            cfg.save(nvm);
            return cfg;
        }

        let mut cfg = Config::defaults();
        cfg.mode = Mode::from_byte(nvm.read_byte(layout::MODE));
        cfg.partner_address = nvm.read_byte(layout::PARTNER_ADDRESS);
        cfg.eot_char = nvm.read_byte(layout::EOT_CHAR);
        cfg.eot_enable = nvm.read_byte(layout::EOT_ENABLE) != 0;
        cfg.eos_code = EosCode::from_byte(nvm.read_byte(layout::EOS_CODE));
        cfg.eoi_use = nvm.read_byte(layout::EOI_USE) != 0;
        cfg.autoread = nvm.read_byte(layout::AUTOREAD) != 0;
        cfg.listen_only = nvm.read_byte(layout::LISTEN_ONLY) != 0;
        cfg.save_cfg = nvm.read_byte(layout::SAVE_CFG) != 0;
        cfg.derive_eos();
        cfg
    }

    /// Writes the full ten-byte record, including the validity sentinel.
    pub fn save(&self, nvm: &mut impl NvMemory) {
        nvm.write_byte(layout::SENTINEL, SENTINEL_VALUE);
        nvm.write_byte(layout::MODE, self.mode as u8);
        nvm.write_byte(layout::PARTNER_ADDRESS, self.partner_address);
        nvm.write_byte(layout::EOT_CHAR, self.eot_char);
        nvm.write_byte(layout::EOT_ENABLE, self.eot_enable as u8);
        nvm.write_byte(layout::EOS_CODE, self.eos_code as u8);
        nvm.write_byte(layout::EOI_USE, self.eoi_use as u8);
        nvm.write_byte(layout::AUTOREAD, self.autoread as u8);
        nvm.write_byte(layout::LISTEN_ONLY, self.listen_only as u8);
        nvm.write_byte(layout::SAVE_CFG, self.save_cfg as u8);
    }

    /// Writes through to EEPROM iff `save_cfg` is set — called after any
    /// command mutates a persisted field.
    pub fn maybe_persist(&self, nvm: &mut impl NvMemory) {
        if self.save_cfg {
            self.save(nvm);
        }
    }

    pub fn set_eos_code(&mut self, code: u8) -> bool {
        match EosCode::from_query_code(code) {
            Some(eos) => {
                self.eos_code = eos;
                self.derive_eos();
                true
            }
            None => false,
        }
    }

    pub fn set_custom_eos(&mut self, byte: u8) {
        self.eos_code = EosCode::Custom;
        self.eos_byte = byte;
    }
}
