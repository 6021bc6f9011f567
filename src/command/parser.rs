//! Tokenizes one line from the ring buffer into a [`super::Command`].
use super::{Command, EosArg};

/// Parses a line already known to start with `+`. Returns `None` for
/// anything unrecognized, which the caller reports as
/// [`crate::error::Error::UnrecognizedCommand`].
pub fn parse(line: &[u8]) -> Option<Command> {
    let text = core::str::from_utf8(line).ok()?;
    if let Some(rest) = text.strip_prefix("++") {
        parse_double(rest.trim())
    } else if let Some(rest) = text.strip_prefix('+') {
        parse_single(rest.trim())
    } else {
        None
    }
}

fn parse_u8(s: &str) -> Option<u8> {
    s.trim().parse().ok()
}

fn parse_u32(s: &str) -> Option<u32> {
    s.trim().parse().ok()
}

fn parse_bool(s: &str) -> Option<bool> {
    match s.trim() {
        "0" => Some(false),
        "1" => Some(true),
        _ => None,
    }
}

/// Splits `"word arg"` into `("word", Some("arg"))`, or `("word", None)`
/// if there's no argument.
fn split_arg(s: &str) -> (&str, Option<&str>) {
    match s.split_once(char::is_whitespace) {
        Some((word, arg)) => (word, Some(arg.trim())),
        None => (s, None),
    }
}

/// The legacy (original-firmware) `+` dialect: a fixed set of
/// colon-argument commands plus two bare keywords.
fn parse_single(s: &str) -> Option<Command> {
    if let Some(v) = s.strip_prefix("a:") {
        return Some(Command::Address(parse_u8(v)));
    }
    if let Some(v) = s.strip_prefix("t:") {
        // Legacy dialect gives seconds; the rest of the crate works in
        // milliseconds throughout.
        return Some(Command::Timeout(parse_u32(v).map(|secs| secs.saturating_mul(1000))));
    }
    if let Some(v) = s.strip_prefix("eos:") {
        return Some(Command::Eos(EosArg::Custom(parse_u8(v)?)));
    }
    if let Some(v) = s.strip_prefix("eoi:") {
        return Some(Command::Eoi(parse_bool(v)));
    }
    if let Some(v) = s.strip_prefix("strip:") {
        return Some(Command::Strip(parse_u8(v)));
    }
    if let Some(v) = s.strip_prefix("autoread:") {
        return Some(Command::Auto(Some(parse_bool(v).unwrap_or(true))));
    }
    if let Some(v) = s.strip_prefix("debug:") {
        return Some(Command::Debug(Some(parse_bool(v).unwrap_or(false))));
    }
    match s {
        "test" => Some(Command::Test),
        "read" => Some(Command::Read { force_eoi: false }),
        "ver" => Some(Command::Version { long: false }),
        "get" => Some(Command::Trigger),
        "reset" => Some(Command::Reset),
        _ => None,
    }
}

/// The Prologix-style `++` dialect: `word [arg]`.
fn parse_double(s: &str) -> Option<Command> {
    let (word, arg) = split_arg(s);
    match word {
        "addr" => Some(Command::Address(arg.and_then(parse_u8))),
        "read_tmo_ms" => Some(Command::Timeout(arg.and_then(parse_u32))),
        "eos" => Some(Command::Eos(EosArg::Query(arg.and_then(parse_u8)))),
        "eoi" => Some(Command::Eoi(arg.and_then(parse_bool))),
        "mode" => Some(Command::Mode(arg.and_then(parse_bool))),
        "auto" => Some(Command::Auto(arg.map(|a| parse_bool(a).unwrap_or(true)))),
        "eot_enable" => Some(Command::EotEnable(arg.and_then(parse_bool))),
        "eot_char" => Some(Command::EotChar(arg.and_then(parse_u8))),
        "savecfg" => Some(Command::SaveCfg(arg.and_then(parse_bool))),
        "lon" => Some(Command::ListenOnly(arg.and_then(parse_bool))),
        "read" => Some(Command::Read { force_eoi: arg == Some("eoi") }),
        "clr" => Some(Command::Clear),
        "loc" => Some(Command::Local),
        "llo" => Some(Command::LocalLockout),
        "trg" => Some(Command::Trigger),
        "ifc" => Some(Command::InterfaceClear),
        "spoll" => Some(Command::SerialPoll),
        "srq" => Some(Command::QuerySrq),
        "status" => Some(Command::Status(arg.and_then(parse_u8))),
        "rst" => Some(Command::Reset),
        "ver" => Some(Command::Version { long: true }),
        "debug" => Some(Command::Debug(arg.map(|a| parse_bool(a).unwrap_or(false)))),
        _ => None,
    }
}
