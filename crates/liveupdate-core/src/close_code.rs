//! WebSocket close-code diagnostics.

/// Map a numeric close code to human-readable diagnostic text.
///
/// Covers the well-known 1000-series codes; anything else is surfaced as
/// the raw numeric value. The result is the connection diagnostic shown to
/// callers after a close.
#[must_use]
pub fn close_reason(code: u16) -> String {
    let reason = match code {
        1000 => "Normal closure",
        1001 => "Going away",
        1002 => "Protocol error",
        1003 => "Unsupported data",
        1005 => "No status code",
        1006 => "Could not establish connection",
        1007 => "Invalid data",
        1008 => "Policy violation",
        1009 => "Message too big",
        1010 => "Extension required",
        1011 => "Internal error",
        1015 => "TLS handshake",
        other => return other.to_string(),
    };
    reason.to_string()
}
