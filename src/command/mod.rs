//! The `+`/`++` command dialects (`SPEC_FULL.md` §4.G).
//!
//! A line arriving from [`crate::ring::LineRing`] is either a bridge
//! command (starts with `+`) or a GPIB data message to forward verbatim
//! to the addressed instrument. [`parse`] only handles the former;
//! anything else is the caller's cue to treat the line as pass-through
//! data (`Command::Passthrough`).
mod parser;

pub use parser::parse;

/// A decoded `+`/`++` command line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    /// `+a:N` / `++addr N` (no argument queries the current address).
    Address(Option<u8>),
    /// `+t:N` / `++read_tmo_ms N` — timeout in milliseconds.
    Timeout(Option<u32>),
    /// `+eos:N` (raw byte) / `++eos N` (code 0..=3).
    Eos(EosArg),
    /// `+eoi:N` / `++eoi N`.
    Eoi(Option<bool>),
    /// `++mode N` (0 = device, 1 = controller).
    Mode(Option<bool>),
    /// `+autoread:B` / `++auto [B]` — `None` queries; an invalid `B`
    /// snaps to the documented default of enabled, same as a valid `1`.
    Auto(Option<bool>),
    /// `++eot_enable N`.
    EotEnable(Option<bool>),
    /// `++eot_char N`.
    EotChar(Option<u8>),
    /// `++savecfg N`.
    SaveCfg(Option<bool>),
    /// `++lon N` — listen-only mode (device mode only).
    ListenOnly(Option<bool>),
    /// `+strip:N` — number of trailing read bytes to drop.
    Strip(Option<u8>),
    /// `+test` — self-test banner.
    Test,
    /// `+read` / `++read [eoi]` — force a read from the currently
    /// addressed instrument. `force_eoi` requests termination on EOI
    /// regardless of `eoi_use` (`++read eoi`); the legacy dialect has no
    /// argument form.
    Read { force_eoi: bool },
    /// `++clr` — send `SDC` to the addressed instrument.
    Clear,
    /// `++loc` — send `GTL` to the addressed instrument.
    Local,
    /// `++llo` — send `LLO` (bus-wide, or to the addressed instrument).
    LocalLockout,
    /// `++trg` — send `GET` to the addressed instrument.
    Trigger,
    /// `++ifc` — pulse IFC and reassert controller-in-charge.
    InterfaceClear,
    /// `++spoll` — serial-poll the addressed instrument.
    SerialPoll,
    /// `++srq` — query whether SRQ is currently asserted.
    QuerySrq,
    /// `++status` — query/set the device-mode status byte.
    Status(Option<u8>),
    /// `++rst` — request a hard reset.
    Reset,
    /// `+ver` (`long: false`, bare decimal) / `++ver` (`long: true`,
    /// `"Version <N>.0"`).
    Version { long: bool },
    /// `+debug:B` / `++debug [B]` — `None` queries; an invalid `B` snaps
    /// to the documented default of disabled, same as a valid `0`.
    Debug(Option<bool>),
}

/// The argument to `+eos:`/`++eos`: either a query-space code (0..=3) or
/// a raw custom terminator byte, distinguished by which dialect sent it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EosArg {
    Query(Option<u8>),
    Custom(u8),
}
