//! Message framer (C2): the length-prefixed envelope around one payload.
//!
//! ```text
//! Message-Length:<decimal-ascii-length>\r\n\r\n<payload-bytes-of-that-length>
//! ```
//!
//! [`extract_message`] is re-entrant over partial data: call it in a loop
//! after every read and it consumes complete messages one at a time,
//! leaving a partial trailing message untouched in the buffer.

use crate::error::Error;
use crate::transport;
use std::io::Write;

const HEADER_NAME: &str = "Message-Length";
const SEPARATOR: &[u8] = b"\r\n\r\n";

/// A generous ceiling on a single message's payload size, to bound how
/// much a malformed or hostile peer can make us try to allocate.
pub const MAX_MESSAGE_LEN: usize = 64 * 1024 * 1024;

/// Builds the envelope for `payload` and writes it through the stream
/// transport in one shot.
pub fn send_message<W: Write>(stream: &mut W, payload: &[u8]) -> Result<(), Error> {
    let mut framed = Vec::with_capacity(payload.len() + 32);
    write!(framed, "{HEADER_NAME}:{}", payload.len()).expect("writing to a Vec cannot fail");
    framed.extend_from_slice(SEPARATOR);
    framed.extend_from_slice(payload);
    transport::write_all(stream, &framed)?;
    Ok(())
}

/// Scans `rxbuf` for a complete envelope. On success, the payload is
/// drained out (along with its header) and the remainder of `rxbuf` is
/// compacted to the front. Returns `Ok(None)` when no complete message is
/// present yet (a partial header or a header whose payload hasn't fully
/// arrived) — `rxbuf` is left untouched in that case.
pub fn extract_message(rxbuf: &mut Vec<u8>) -> Result<Option<Vec<u8>>, Error> {
    let Some(sep_pos) = find_subslice(rxbuf, SEPARATOR) else {
        return Ok(None);
    };
    let header = &rxbuf[..sep_pos];
    let header_str = std::str::from_utf8(header)
        .map_err(|_| Error::MalformedFrame("header is not valid UTF-8".into()))?;
    let Some((name, len_str)) = header_str.split_once(':') else {
        return Err(Error::MalformedFrame(format!(
            "header missing ':' separator: {header_str:?}"
        )));
    };
    if name != HEADER_NAME {
        return Err(Error::MalformedFrame(format!(
            "unexpected header name: {name:?}"
        )));
    }
    let len: usize = len_str
        .parse()
        .map_err(|_| Error::MalformedFrame(format!("non-numeric length: {len_str:?}")))?;
    if len > MAX_MESSAGE_LEN {
        return Err(Error::MalformedFrame(format!(
            "length {len} exceeds limit {MAX_MESSAGE_LEN}"
        )));
    }

    let payload_start = sep_pos + SEPARATOR.len();
    let payload_end = payload_start + len;
    if rxbuf.len() < payload_end {
        return Ok(None);
    }

    let payload = rxbuf[payload_start..payload_end].to_vec();
    rxbuf.drain(..payload_end);
    Ok(Some(payload))
}

fn find_subslice(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    haystack
        .windows(needle.len())
        .position(|window| window == needle)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn frame(payload: &[u8]) -> Vec<u8> {
        let mut out = Vec::new();
        send_message(&mut out, payload).unwrap();
        out
    }

    #[test]
    fn round_trips_a_single_message() {
        let mut buf = frame(b"hello");
        let msg = extract_message(&mut buf).unwrap().unwrap();
        assert_eq!(msg, b"hello");
        assert!(buf.is_empty());
    }

    #[test]
    fn extracts_messages_in_order_from_concatenation() {
        let mut buf = Vec::new();
        buf.extend(frame(b"one"));
        buf.extend(frame(b"two"));
        buf.extend(frame(b"three"));

        let m1 = extract_message(&mut buf).unwrap().unwrap();
        let m2 = extract_message(&mut buf).unwrap().unwrap();
        let m3 = extract_message(&mut buf).unwrap().unwrap();
        assert_eq!(m1, b"one");
        assert_eq!(m2, b"two");
        assert_eq!(m3, b"three");
        assert!(buf.is_empty());
    }

    #[test]
    fn partial_header_yields_no_message_yet() {
        let full = frame(b"hello");
        let mut partial = full[..full.len() - 8].to_vec();
        let before = partial.clone();
        let result = extract_message(&mut partial).unwrap();
        assert!(result.is_none());
        assert_eq!(partial, before);
    }

    #[test]
    fn incremental_delivery_reassembles_exactly() {
        let full = frame(b"split across several reads");
        let mut buf = Vec::new();
        let mut result = None;
        for byte in full {
            buf.push(byte);
            result = extract_message(&mut buf).unwrap();
            if result.is_some() {
                break;
            }
        }
        assert_eq!(result.unwrap(), b"split across several reads");
    }

    #[test]
    fn payload_may_contain_crlf() {
        let payload = b"line one\r\nline two\r\n";
        let mut buf = frame(payload);
        let msg = extract_message(&mut buf).unwrap().unwrap();
        assert_eq!(&msg[..], &payload[..]);
    }

    #[test]
    fn missing_colon_is_malformed() {
        let mut buf = b"Message-Length5\r\n\r\nhello".to_vec();
        assert!(matches!(
            extract_message(&mut buf),
            Err(Error::MalformedFrame(_))
        ));
    }

    #[test]
    fn non_numeric_length_is_malformed() {
        let mut buf = b"Message-Length:abc\r\n\r\nhello".to_vec();
        assert!(matches!(
            extract_message(&mut buf),
            Err(Error::MalformedFrame(_))
        ));
    }
}
