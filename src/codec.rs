//! Request/response codec (C3): a self-describing, text-oriented
//! marshalling of variable-arity, mixed-type parameter and return lists,
//! plus a recursive directory-tree codec.
//!
//! Wire shapes (see spec §4.3):
//!
//! ```text
//! Command:<opcode>\r\n
//! ParamNum:<n>\r\n
//! <size-1>\r\n<raw-bytes-1>\r\n
//! ...
//! <size-n>\r\n<raw-bytes-n>\r\n
//! ```
//!
//! ```text
//! Errno:<err>\r\n
//! ReturnNum:<m>\r\n
//! <size-1>\r\n<raw-bytes-1>\r\n
//! ...
//! ```
//!
//! ```text
//! NodeName:<name>\r\n
//! ChildNum:<k>\r\n
//! <k serialized child nodes back-to-back>
//! ```

use crate::error::Error;
use crate::opcode::Opcode;
use std::io::Write;

const CRLF: &[u8] = b"\r\n";

/// A request: an opcode plus its ordered parameter slots.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Request {
    pub op: Opcode,
    pub params: Vec<Vec<u8>>,
}

/// A response: the errno raised by the server's invocation (0 when none)
/// plus ordered return slots.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Response {
    pub err: i32,
    pub returns: Vec<Vec<u8>>,
}

/// A directory tree node: a UTF-8 name and an ordered list of children.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirTree {
    pub name: String,
    pub children: Vec<DirTree>,
}

/// Encodes an `i64` as its decimal ASCII slot, per the integer slot convention.
pub fn encode_int(v: i64) -> Vec<u8> {
    v.to_string().into_bytes()
}

/// Decodes a decimal ASCII slot back into an `i64`.
pub fn decode_int(slot: &[u8]) -> Result<i64, Error> {
    std::str::from_utf8(slot)
        .ok()
        .and_then(|s| s.parse().ok())
        .ok_or_else(|| Error::MalformedMessage(format!("not a signed decimal integer: {slot:?}")))
}

// --- Request ---

pub fn encode_request(req: &Request) -> Vec<u8> {
    let mut out = Vec::new();
    write!(out, "Command:{}\r\n", req.op.as_u8()).unwrap();
    write!(out, "ParamNum:{}\r\n", req.params.len()).unwrap();
    for param in &req.params {
        encode_slot(&mut out, param);
    }
    out
}

pub fn decode_request(bytes: &[u8]) -> Result<Request, Error> {
    let mut cur = Cursor::new(bytes);
    let op_str = cur.take_header("Command")?;
    let op_val: u8 = op_str
        .parse()
        .map_err(|_| Error::MalformedMessage(format!("non-numeric opcode: {op_str:?}")))?;
    let op = Opcode::try_from(op_val)?;
    let n = cur.take_header_usize("ParamNum")?;
    let params = cur.take_slots(n)?;
    Ok(Request { op, params })
}

// --- Response ---

pub fn encode_response(resp: &Response) -> Vec<u8> {
    let mut out = Vec::new();
    write!(out, "Errno:{}\r\n", resp.err).unwrap();
    write!(out, "ReturnNum:{}\r\n", resp.returns.len()).unwrap();
    for ret in &resp.returns {
        encode_slot(&mut out, ret);
    }
    out
}

pub fn decode_response(bytes: &[u8]) -> Result<Response, Error> {
    let mut cur = Cursor::new(bytes);
    let err_str = cur.take_header("Errno")?;
    let err: i32 = err_str
        .parse()
        .map_err(|_| Error::MalformedMessage(format!("non-numeric errno: {err_str:?}")))?;
    let n = cur.take_header_usize("ReturnNum")?;
    let returns = cur.take_slots(n)?;
    Ok(Response { err, returns })
}

fn encode_slot(out: &mut Vec<u8>, slot: &[u8]) {
    write!(out, "{}\r\n", slot.len()).unwrap();
    out.extend_from_slice(slot);
    out.extend_from_slice(CRLF);
}

// --- Directory tree ---

/// Encodes a directory tree depth-first. Rejects (rather than silently
/// corrupting the stream on) a name containing the line terminator — see
/// SPEC_FULL.md §4.3's resolution of the open question.
pub fn encode_tree(tree: &DirTree) -> Result<Vec<u8>, Error> {
    let mut out = Vec::new();
    encode_tree_into(tree, &mut out)?;
    Ok(out)
}

fn encode_tree_into(tree: &DirTree, out: &mut Vec<u8>) -> Result<(), Error> {
    if tree.name.contains('\r') || tree.name.contains('\n') {
        return Err(Error::MalformedArgument(format!(
            "directory entry name contains a line terminator: {:?}",
            tree.name
        )));
    }
    write!(out, "NodeName:{}\r\n", tree.name).unwrap();
    write!(out, "ChildNum:{}\r\n", tree.children.len()).unwrap();
    for child in &tree.children {
        encode_tree_into(child, out)?;
    }
    Ok(())
}

/// Decodes a directory tree, advancing a shared cursor strictly depth-first.
pub fn decode_tree(bytes: &[u8]) -> Result<DirTree, Error> {
    let mut cur = Cursor::new(bytes);
    decode_tree_node(&mut cur)
}

fn decode_tree_node(cur: &mut Cursor<'_>) -> Result<DirTree, Error> {
    let name = cur.take_header("NodeName")?.to_string();
    let k = cur.take_header_usize("ChildNum")?;
    let mut children = Vec::with_capacity(k);
    for _ in 0..k {
        children.push(decode_tree_node(cur)?);
    }
    Ok(DirTree { name, children })
}

/// A forward-only cursor over an in-memory payload, used by every decoder
/// in this module. All three wire shapes share the same header-line and
/// size-prefixed-slot grammar, so a single cursor serves all of them.
struct Cursor<'a> {
    bytes: &'a [u8],
    pos: usize,
}

impl<'a> Cursor<'a> {
    fn new(bytes: &'a [u8]) -> Self {
        Cursor { bytes, pos: 0 }
    }

    /// Reads one `\r\n`-terminated line, advancing past the terminator.
    fn take_line(&mut self) -> Result<&'a str, Error> {
        let rest = &self.bytes[self.pos..];
        let idx = rest
            .windows(2)
            .position(|w| w == CRLF)
            .ok_or_else(|| Error::MalformedMessage("unterminated line".into()))?;
        let line = std::str::from_utf8(&rest[..idx])
            .map_err(|_| Error::MalformedMessage("line is not valid UTF-8".into()))?;
        self.pos += idx + 2;
        Ok(line)
    }

    /// Reads a `Name:value\r\n` header line and checks the name matches.
    fn take_header(&mut self, expected_name: &str) -> Result<&'a str, Error> {
        let line = self.take_line()?;
        let (name, value) = line.split_once(':').ok_or_else(|| {
            Error::MalformedMessage(format!("header missing ':': {line:?}"))
        })?;
        if name != expected_name {
            return Err(Error::MalformedMessage(format!(
                "expected header {expected_name:?}, got {name:?}"
            )));
        }
        Ok(value)
    }

    fn take_header_usize(&mut self, expected_name: &str) -> Result<usize, Error> {
        let value = self.take_header(expected_name)?;
        value
            .parse()
            .map_err(|_| Error::MalformedMessage(format!("non-numeric count: {value:?}")))
    }

    /// Reads `count` size-prefixed opaque slots.
    fn take_slots(&mut self, count: usize) -> Result<Vec<Vec<u8>>, Error> {
        let mut slots = Vec::with_capacity(count);
        for _ in 0..count {
            let size_line = self.take_line()?;
            let size: usize = size_line
                .parse()
                .map_err(|_| Error::MalformedMessage(format!("non-numeric slot size: {size_line:?}")))?;
            if self.pos + size + 2 > self.bytes.len() {
                return Err(Error::MalformedMessage(
                    "slot size exceeds remaining bytes".into(),
                ));
            }
            let data = self.bytes[self.pos..self.pos + size].to_vec();
            self.pos += size;
            let terminator = &self.bytes[self.pos..self.pos + 2];
            if terminator != CRLF {
                return Err(Error::MalformedMessage(
                    "slot is not followed by its line terminator".into(),
                ));
            }
            self.pos += 2;
            slots.push(data);
        }
        Ok(slots)
    }
}
