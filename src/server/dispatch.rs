//! Server dispatcher (C6): decodes a request, invokes the real local
//! system call, and marshals the result — one handler per opcode.
//!
//! Handles are not tracked in any table here: a "remote handle" is simply
//! the real OS file descriptor `open(2)` returned, offset by [`handle::OFFSET`]
//! before it crosses the wire. The kernel itself is what "retains the
//! native handle until the client issues a matching close" (§3's
//! lifecycle invariant) — there is nothing for this dispatcher to track
//! beyond that.

use crate::codec::{decode_int, encode_int, Request, Response};
use crate::error::Error;
use crate::handle;
use crate::logging;
use crate::opcode::Opcode;
use crate::server::dirtree;
use std::ffi::CString;

/// Dispatches a decoded request to its handler and returns the response
/// to send back. Returns `Ok(None)` for opcodes that are never supposed
/// to arrive on the wire (`FreeDirTree`, which the client stub always
/// handles locally) — the caller should log and continue without
/// replying, matching the unknown-opcode policy in §4.6.
pub fn dispatch(req: &Request) -> Result<Option<Response>, Error> {
    let response = match req.op {
        Opcode::Open => handle_open(req)?,
        Opcode::Close => handle_close(req)?,
        Opcode::Read => handle_read(req)?,
        Opcode::Write => handle_write(req)?,
        Opcode::Lseek => handle_lseek(req)?,
        Opcode::Stat => handle_stat(req)?,
        Opcode::Unlink => handle_unlink(req)?,
        Opcode::GetDirEntries => handle_getdirentries(req)?,
        Opcode::GetDirTree => handle_getdirtree(req)?,
        Opcode::FreeDirTree => {
            logging::warn("received FreeDirTree on the wire; this opcode is client-local only");
            return Ok(None);
        }
    };
    Ok(Some(response))
}

fn param(req: &Request, idx: usize) -> Result<&[u8], Error> {
    req.params.get(idx).map(Vec::as_slice).ok_or_else(|| {
        Error::MalformedMessage(format!(
            "op {:?} expected at least {} params, got {}",
            req.op,
            idx + 1,
            req.params.len()
        ))
    })
}

fn param_int(req: &Request, idx: usize) -> Result<i64, Error> {
    decode_int(param(req, idx)?)
}

fn param_path(req: &Request, idx: usize) -> Result<CString, Error> {
    let bytes = param(req, idx)?;
    CString::new(bytes).map_err(|_| Error::MalformedMessage("path contains an embedded NUL".into()))
}

fn errno_response(returns: Vec<Vec<u8>>) -> Response {
    Response { err: syscall_errno(), returns }
}

fn ok_response(returns: Vec<Vec<u8>>) -> Response {
    Response { err: 0, returns }
}

fn syscall_errno() -> i32 {
    std::io::Error::last_os_error().raw_os_error().unwrap_or(libc::EIO)
}

fn handle_open(req: &Request) -> Result<Response, Error> {
    let path = param_path(req, 0)?;
    let flags = param_int(req, 1)? as libc::c_int;
    let mode = param_int(req, 2)? as libc::mode_t;

    // SAFETY: `path` is a valid, NUL-terminated C string for the duration
    // of this call; `open` is the real syscall this entire protocol exists
    // to forward.
    let native_fd = unsafe { libc::open(path.as_ptr(), flags, mode) };
    if native_fd < 0 {
        return Ok(errno_response(vec![encode_int(-1)]));
    }
    let client_handle = handle::to_client(native_fd as i64);
    Ok(ok_response(vec![encode_int(client_handle)]))
}

fn handle_close(req: &Request) -> Result<Response, Error> {
    let client_handle = param_int(req, 0)?;
    let native_fd = handle::to_server(client_handle) as libc::c_int;
    let rc = unsafe { libc::close(native_fd) };
    if rc < 0 {
        return Ok(errno_response(vec![encode_int(-1)]));
    }
    Ok(ok_response(vec![encode_int(0)]))
}

fn handle_read(req: &Request) -> Result<Response, Error> {
    let client_handle = param_int(req, 0)?;
    let native_fd = handle::to_server(client_handle) as libc::c_int;
    // params[1] is the capacity placeholder; its contents are never consulted.
    let count = param_int(req, 2)?.max(0) as usize;

    let mut buf = vec![0u8; count];
    let n = unsafe { libc::read(native_fd, buf.as_mut_ptr() as *mut libc::c_void, count) };
    if n < 0 {
        return Ok(errno_response(vec![encode_int(-1), vec![]]));
    }
    let n = n as usize;
    buf.truncate(n);
    Ok(ok_response(vec![encode_int(n as i64), buf]))
}

fn handle_write(req: &Request) -> Result<Response, Error> {
    let client_handle = param_int(req, 0)?;
    let native_fd = handle::to_server(client_handle) as libc::c_int;
    let data = param(req, 1)?;
    let count = param_int(req, 2)?.max(0) as usize;
    let data = &data[..count.min(data.len())];

    let n = unsafe { libc::write(native_fd, data.as_ptr() as *const libc::c_void, data.len()) };
    if n < 0 {
        return Ok(errno_response(vec![encode_int(-1)]));
    }
    Ok(ok_response(vec![encode_int(n as i64)]))
}

fn handle_lseek(req: &Request) -> Result<Response, Error> {
    let client_handle = param_int(req, 0)?;
    let native_fd = handle::to_server(client_handle) as libc::c_int;
    let offset = param_int(req, 1)?;
    let whence = param_int(req, 2)? as libc::c_int;

    let new_offset = unsafe { libc::lseek(native_fd, offset, whence) };
    if new_offset < 0 {
        return Ok(errno_response(vec![encode_int(-1)]));
    }
    Ok(ok_response(vec![encode_int(new_offset)]))
}

fn handle_stat(req: &Request) -> Result<Response, Error> {
    let path = param_path(req, 0)?;
    let mut stat_buf: libc::stat = unsafe { std::mem::zeroed() };
    let rc = unsafe { libc::stat(path.as_ptr(), &mut stat_buf) };
    if rc < 0 {
        return Ok(errno_response(vec![encode_int(-1), vec![]]));
    }
    let image = unsafe {
        std::slice::from_raw_parts(
            &stat_buf as *const libc::stat as *const u8,
            std::mem::size_of::<libc::stat>(),
        )
    }
    .to_vec();
    Ok(ok_response(vec![encode_int(0), image]))
}

fn handle_unlink(req: &Request) -> Result<Response, Error> {
    let path = param_path(req, 0)?;
    let rc = unsafe { libc::unlink(path.as_ptr()) };
    if rc < 0 {
        return Ok(errno_response(vec![encode_int(-1)]));
    }
    Ok(ok_response(vec![encode_int(0)]))
}

fn handle_getdirentries(req: &Request) -> Result<Response, Error> {
    let client_handle = param_int(req, 0)?;
    let native_fd = handle::to_server(client_handle) as libc::c_int;
    let nbytes = param_int(req, 1)?.max(0) as usize;
    let mut basep = param_int(req, 2)?;

    let mut buf = vec![0u8; nbytes];
    let n = raw_getdirentries(native_fd, &mut buf, &mut basep);
    if n < 0 {
        return Ok(errno_response(vec![encode_int(-1), vec![], encode_int(basep)]));
    }
    let n = n as usize;
    buf.truncate(n);
    Ok(ok_response(vec![encode_int(n as i64), buf, encode_int(basep)]))
}

/// Platform-dependent directory-entries read (§6: "platform-dependent
/// payloads"). macOS/BSD expose `getdirentries(2)` directly; Linux has no
/// such call, so we fall back to the `getdents64` syscall, which has the
/// same "opaque platform blob plus a resume cookie" shape.
#[cfg(target_os = "macos")]
fn raw_getdirentries(fd: libc::c_int, buf: &mut [u8], basep: &mut i64) -> isize {
    unsafe {
        libc::getdirentries(fd, buf.as_mut_ptr() as *mut libc::c_char, buf.len(), basep as *mut i64)
            as isize
    }
}

#[cfg(all(unix, not(target_os = "macos")))]
fn raw_getdirentries(fd: libc::c_int, buf: &mut [u8], basep: &mut i64) -> isize {
    unsafe {
        // basep is unused as a seek cookie on the getdents64 path: the
        // fd's own file offset tracks the directory read position.
        let _ = libc::lseek(fd, *basep, libc::SEEK_SET);
        let n = libc::syscall(
            libc::SYS_getdents64,
            fd,
            buf.as_mut_ptr() as *mut libc::c_void,
            buf.len(),
        );
        if n >= 0 {
            *basep = libc::lseek(fd, 0, libc::SEEK_CUR);
        }
        n as isize
    }
}

fn handle_getdirtree(req: &Request) -> Result<Response, Error> {
    let path_bytes = param(req, 0)?;
    let path_str = String::from_utf8_lossy(path_bytes).into_owned();
    match dirtree::read_dir_tree(std::path::Path::new(&path_str)) {
        Ok(tree) => {
            let encoded = crate::codec::encode_tree(&tree)?;
            Ok(ok_response(vec![encoded]))
        }
        Err(_) => Ok(errno_response(vec![vec![]])),
    }
}
