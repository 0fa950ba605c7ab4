//! Host command protocol: one command per newline-terminated line,
//! `<Type:char><Payload:optional decimal integer>`.

use crate::error::ProtocolError;

/// Longest accepted command line. The protocol never needs more than a
/// letter and a short decimal payload; anything longer is noise.
pub const MAX_LINE_BYTES: usize = 64;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    /// `A` — begin a test run (down direction).
    StartTest,
    /// `B` — stop motion, disable motor, return to Idle.
    StopAll,
    /// `C` — drive to the lower switch and back off.
    Reset,
    /// `D` — run the blocking calibration wizard.
    Calibrate,
    /// `R<rpm>` — set motion speed.
    SetSpeed(u32),
    /// `I<ms>` — set the force sampling/logging interval.
    SetInterval(u64),
    /// `S` — reply `R:<rpm>,I:<intervalMs>`.
    QueryStatus,
}

/// Parse one complete line (without its terminator). Stateless; the caller
/// owns line assembly.
pub fn parse_line(line: &str) -> Result<Command, ProtocolError> {
    let line = line.trim_end_matches('\r');
    let mut chars = line.chars();
    let Some(kind) = chars.next() else {
        return Err(ProtocolError::EmptyLine);
    };
    let payload = chars.as_str().trim();
    match kind {
        'A' => Ok(Command::StartTest),
        'B' => Ok(Command::StopAll),
        'C' => Ok(Command::Reset),
        'D' => Ok(Command::Calibrate),
        'R' => parse_payload(kind, payload).map(Command::SetSpeed),
        'I' => parse_payload(kind, payload).map(Command::SetInterval),
        'S' => Ok(Command::QueryStatus),
        other => Err(ProtocolError::UnknownCommand(other)),
    }
}

fn parse_payload<T: std::str::FromStr>(kind: char, payload: &str) -> Result<T, ProtocolError> {
    if payload.is_empty() {
        return Err(ProtocolError::MissingPayload(kind));
    }
    payload
        .parse::<T>()
        .map_err(|_| ProtocolError::InvalidPayload(kind, payload.to_string()))
}
