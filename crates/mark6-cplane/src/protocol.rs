//! cplane command framing and response parsing.
//!
//! # Command format
//!
//! ```text
//! <name>?<args>;\n     query
//! <name>=<args>;\n     assignment
//! ```
//!
//! # Response format
//!
//! ```text
//! <sigil><name>?[<args>=]<cplane>:<dplane>:<field>:...;\n
//! <sigil><name>=<cplane>:<dplane>:<field>:...;\n
//! ```
//!
//! The sigil is a single punctuation character (`!` from the recorder, `#`
//! in some firmware). A query response may echo its arguments before an `=`,
//! as in `!mstat?1=0:0:...`; the echo is kept in
//! [`Response::echo_args`](mark6_core::Response::echo_args).

use bytes::{BufMut, BytesMut};
use mark6_core::error::{Error, Result};
use mark6_core::types::{Response, ResponseType};

/// Terminates every command and response.
pub const TERMINATOR: u8 = b';';

/// Appended after the terminator on every command.
pub const LINE_TERMINATOR: u8 = b'\n';

/// Normalise a command into wire bytes.
///
/// Trims surrounding whitespace, appends `;` if it is missing and ends the
/// line with `\n`. Normalising an already-framed command yields the same
/// bytes.
///
/// # Example
///
/// ```
/// use mark6_cplane::protocol::normalize_command;
///
/// assert_eq!(normalize_command("mstat?1"), b"mstat?1;\n");
/// assert_eq!(normalize_command("mstat?1;\n"), b"mstat?1;\n");
/// ```
pub fn normalize_command(command: &str) -> Vec<u8> {
    let body = command_body(command);
    let mut buf = BytesMut::with_capacity(body.len() + 2);
    buf.put_slice(body.as_bytes());
    buf.put_u8(TERMINATOR);
    buf.put_u8(LINE_TERMINATOR);
    buf.to_vec()
}

/// The command text without surrounding whitespace or trailing `;`.
pub fn command_body(command: &str) -> &str {
    let trimmed = command.trim();
    trimmed.strip_suffix(';').unwrap_or(trimmed).trim_end()
}

/// Whether `buf` holds a complete response (ends in `;` once trailing
/// whitespace is ignored).
pub fn is_frame_complete(buf: &[u8]) -> bool {
    buf.trim_ascii_end().last() == Some(&TERMINATOR)
}

/// Parse one raw response into a [`Response`].
///
/// Fails with [`Error::Parse`] when the text is not UTF-8, carries neither a
/// `?` nor an `=` marker, has an empty command name, or lacks the cplane and
/// dplane codes. Non-zero codes are returned as-is; whether they are fatal
/// is up to the caller.
///
/// # Example
///
/// ```
/// use mark6_cplane::protocol::parse_response;
/// use mark6_core::ResponseType;
///
/// let r = parse_response(b"!list?0:0:0:0;\n").unwrap();
/// assert_eq!(r.base_command, "list");
/// assert_eq!(r.response_type, ResponseType::Query);
/// assert_eq!(r.fields, vec!["0", "0"]);
/// ```
pub fn parse_response(raw: &[u8]) -> Result<Response> {
    let text = std::str::from_utf8(raw)
        .map_err(|e| Error::Parse(format!("response is not UTF-8: {e}")))?;

    let trimmed = text.trim();
    let body = trimmed.strip_suffix(';').unwrap_or(trimmed).trim_end();
    let body = body
        .strip_prefix(|c: char| c.is_ascii_punctuation() && c != '?' && c != '=')
        .unwrap_or(body);

    let marker = body
        .find(['?', '='])
        .ok_or_else(|| Error::Parse(format!("no `?` or `=` marker in {body:?}")))?;

    let base_command = body[..marker].trim();
    if base_command.is_empty() {
        return Err(Error::Parse(format!("empty command name in {body:?}")));
    }

    let after = &body[marker + 1..];
    let (response_type, echo_args, payload) = if body.as_bytes()[marker] == b'=' {
        (ResponseType::Command, None, after)
    } else {
        // `?args=` echo: an `=` before the first `:` ends the echoed arguments.
        let head_end = after.find(':').unwrap_or(after.len());
        match after[..head_end].find('=') {
            Some(eq) => {
                let echo = after[..eq].trim();
                let echo = (!echo.is_empty()).then(|| echo.to_string());
                (ResponseType::Query, echo, &after[eq + 1..])
            }
            None => (ResponseType::Query, None, after),
        }
    };

    let mut parts = payload.split(':').map(str::trim);
    let cplane_code = parts
        .next()
        .filter(|c| !c.is_empty())
        .ok_or_else(|| Error::Parse(format!("{base_command}: missing cplane code")))?
        .to_string();
    let dplane_code = parts
        .next()
        .ok_or_else(|| Error::Parse(format!("{base_command}: missing dplane code")))?
        .to_string();
    let fields = parts.map(str::to_string).collect();

    Ok(Response {
        response_type,
        base_command: base_command.to_string(),
        echo_args,
        cplane_code,
        dplane_code,
        fields,
    })
}
