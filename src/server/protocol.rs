//! Wire format of the command server.
//!
//! Plaintext, newline-delimited UTF-8. Every request line is answered with
//! [`REPLY_PREFIX`] followed by the line and a `\n` terminator. `\r\n` request
//! terminators are accepted and stripped.

use tokio_util::codec::LinesCodec;

/// Port the command server listens on unless configured otherwise.
pub const DEFAULT_PORT: u16 = 12345;

/// Prefix of every reply line.
pub const REPLY_PREFIX: &str = "Server received: ";

/// Builds the reply for one request line (without terminator).
///
/// ```
/// assert_eq!(focusvisor::server::reply("ping"), "Server received: ping");
/// ```
pub fn reply(line: &str) -> String {
    format!("{REPLY_PREFIX}{line}")
}

/// Line codec used for both directions; `None` means no length limit.
pub(crate) fn line_codec(limit: Option<usize>) -> LinesCodec {
    match limit {
        Some(max) => LinesCodec::new_with_max_length(max),
        None => LinesCodec::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reply_keeps_line_verbatim() {
        assert_eq!(reply("hello world"), "Server received: hello world");
        assert_eq!(reply(""), "Server received: ");
    }

    #[test]
    fn test_codec_limit() {
        assert_eq!(line_codec(Some(4)).max_length(), 4);
        assert_eq!(line_codec(None).max_length(), usize::MAX);
    }
}
