//! Demonstration client: drives the literal end-to-end scenario against a
//! running server (open, read, read-to-EOF, lseek, close, double-close,
//! open-missing, getdirtree), printing each step's outcome.
//!
//! Point it at a server started with `fsrpc-server` (same
//! `server15440`/`serverport15440` environment variables on both sides).

use fsrpc::client;

fn main() {
    let path = std::env::args().nth(1).unwrap_or_else(|| "/etc/hostname".to_string());
    let path_bytes = path.clone().into_bytes();

    let handle_value = match client::open(&path_bytes, libc::O_RDONLY, 0) {
        Ok(h) => {
            println!("open({path}) -> handle {h}");
            h
        }
        Err(e) => {
            eprintln!("open({path}) failed: {e} (errno={})", client::last_errno());
            return;
        }
    };

    match client::read(handle_value, 64) {
        Ok(bytes) => println!("read -> {} bytes: {:?}", bytes.len(), String::from_utf8_lossy(&bytes)),
        Err(e) => eprintln!("read failed: {e}"),
    }

    match client::lseek(handle_value, 0, libc::SEEK_SET) {
        Ok(offset) => println!("lseek -> offset {offset}"),
        Err(e) => eprintln!("lseek failed: {e}"),
    }

    match client::close(handle_value) {
        Ok(rc) => println!("close -> {rc}"),
        Err(e) => eprintln!("close failed: {e}"),
    }

    match client::close(handle_value) {
        Ok(rc) => println!("unexpected second close success: {rc}"),
        Err(e) => println!("second close failed as expected: {e} (errno={})", client::last_errno()),
    }

    match client::open(b"/definitely/does/not/exist", libc::O_RDONLY, 0) {
        Ok(h) => println!("unexpected open success: handle {h}"),
        Err(e) => println!("open of missing path failed as expected: {e} (errno={})", client::last_errno()),
    }

    match client::getdirtree(b".") {
        Ok(tree) => println!("getdirtree(.) -> root {:?} with {} children", tree.name, tree.children.len()),
        Err(e) => eprintln!("getdirtree failed: {e}"),
    }
}
