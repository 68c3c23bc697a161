//! Connection lifecycle (C7): accept loop plus per-connection worker.
//!
//! One thread per accepted connection (the systems-language realization
//! the spec explicitly sanctions in place of process-per-client). A slow
//! or stuck client only blocks its own thread.

use crate::codec;
use crate::config::Endpoint;
use crate::framer;
use crate::logging;
use crate::server::dispatch;
use std::net::{TcpListener, TcpStream};

const ACCEPT_BACKLOG_HINT: &str = "large backlog requested via TcpListener::bind defaults";

/// Binds `endpoint` and serves connections until the process is killed or
/// the listener errors out. Each accepted connection gets its own thread
/// running [`serve_connection`].
pub fn run(endpoint: &Endpoint) -> std::io::Result<()> {
    let addr = endpoint.to_socket_addr()?;
    let listener = TcpListener::bind(addr)?;
    logging::info(&format!("listening on {addr} ({ACCEPT_BACKLOG_HINT})"));

    for incoming in listener.incoming() {
        match incoming {
            Ok(stream) => {
                let peer = stream.peer_addr().ok();
                std::thread::spawn(move || {
                    logging::info(&format!("connection accepted from {peer:?}"));
                    if let Err(e) = serve_connection(stream) {
                        logging::warn(&format!("connection from {peer:?} ended: {e}"));
                    } else {
                        logging::info(&format!("connection from {peer:?} closed cleanly"));
                    }
                });
            }
            Err(e) => logging::warn(&format!("accept failed: {e}")),
        }
    }
    Ok(())
}

/// Services one connection: receive-buffer loop, decode, dispatch, reply.
/// Returns once the peer closes or a fatal transport error occurs.
/// A decode failure is logged and ends the connection (§4.6 point 2);
/// an unknown opcode is logged and the connection continues (§4.6 "Unknown
/// opcode").
fn serve_connection(mut stream: TcpStream) -> std::io::Result<()> {
    stream.set_nodelay(true).ok();
    let mut rxbuf = Vec::new();
    let mut read_buf = [0u8; 64 * 1024];

    loop {
        let outcome = crate::transport::block_read(&mut stream, &mut read_buf)?;
        if outcome.peer_closed {
            return Ok(());
        }
        rxbuf.extend_from_slice(&read_buf[..outcome.n]);

        loop {
            let message = match framer::extract_message(&mut rxbuf) {
                Ok(Some(msg)) => msg,
                Ok(None) => break,
                Err(e) => {
                    logging::warn(&format!("malformed frame, closing connection: {e}"));
                    return Ok(());
                }
            };

            let request = match codec::decode_request(&message) {
                Ok(req) => req,
                Err(e) => {
                    logging::warn(&format!("malformed request, closing connection: {e}"));
                    return Ok(());
                }
            };

            match dispatch::dispatch(&request) {
                Ok(Some(response)) => {
                    let encoded = codec::encode_response(&response);
                    if let Err(e) = framer::send_message(&mut stream, &encoded) {
                        logging::warn(&format!("failed to send response: {e}"));
                        return Ok(());
                    }
                }
                Ok(None) => {
                    // Opcode is client-local only (FreeDirTree); skip and continue.
                }
                Err(e) => {
                    logging::warn(&format!("request handler error: {e}"));
                    return Ok(());
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::{decode_int, decode_response, encode_int, encode_request};
    use crate::opcode::Opcode;
    use std::io::{Read, Write};
    use std::net::TcpStream as ClientStream;

    #[test]
    fn serves_an_open_close_round_trip_over_a_real_socket() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        std::thread::spawn(move || {
            if let Ok((stream, _)) = listener.accept() {
                let _ = serve_connection(stream);
            }
        });

        let mut client = ClientStream::connect(addr).unwrap();

        let path = std::env::temp_dir()
            .join(format!("fsrpc-listener-test-{}", std::process::id()));
        std::fs::write(&path, b"payload").unwrap();
        let path_bytes = path.to_string_lossy().into_owned().into_bytes();

        let open_req = crate::codec::Request {
            op: Opcode::Open,
            params: vec![path_bytes, encode_int(libc::O_RDONLY as i64), encode_int(0)],
        };
        framer::send_message(&mut client, &encode_request(&open_req)).unwrap();

        let mut rxbuf = Vec::new();
        let mut buf = [0u8; 4096];
        let response = loop {
            if let Some(msg) = framer::extract_message(&mut rxbuf).unwrap() {
                break msg;
            }
            let n = client.read(&mut buf).unwrap();
            rxbuf.extend_from_slice(&buf[..n]);
        };
        let resp = decode_response(&response).unwrap();
        assert_eq!(resp.err, 0);
        let handle_val = decode_int(&resp.returns[0]).unwrap();
        assert!(handle_val >= crate::handle::OFFSET);

        let close_req = crate::codec::Request {
            op: Opcode::Close,
            params: vec![encode_int(handle_val)],
        };
        framer::send_message(&mut client, &encode_request(&close_req)).unwrap();
        client.flush().ok();

        std::fs::remove_file(&path).ok();
    }

    fn read_one_response(client: &mut ClientStream, rxbuf: &mut Vec<u8>) -> crate::codec::Response {
        let mut buf = [0u8; 4096];
        loop {
            if let Some(msg) = framer::extract_message(rxbuf).unwrap() {
                return decode_response(&msg).unwrap();
            }
            let n = client.read(&mut buf).unwrap();
            rxbuf.extend_from_slice(&buf[..n]);
        }
    }

    #[test]
    fn two_concurrent_clients_do_not_cross_talk() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        std::thread::spawn(move || {
            for stream in listener.incoming() {
                if let Ok(stream) = stream {
                    std::thread::spawn(move || {
                        let _ = serve_connection(stream);
                    });
                }
            }
        });

        let path_a = std::env::temp_dir().join(format!("fsrpc-crosstalk-a-{}", std::process::id()));
        let path_b = std::env::temp_dir().join(format!("fsrpc-crosstalk-b-{}", std::process::id()));
        std::fs::write(&path_a, b"AAAA").unwrap();
        std::fs::write(&path_b, b"BBBB").unwrap();

        let mut client_a = ClientStream::connect(addr).unwrap();
        let mut client_b = ClientStream::connect(addr).unwrap();

        let open = |path: &std::path::Path| crate::codec::Request {
            op: Opcode::Open,
            params: vec![
                path.to_string_lossy().into_owned().into_bytes(),
                encode_int(libc::O_RDONLY as i64),
                encode_int(0),
            ],
        };
        framer::send_message(&mut client_a, &encode_request(&open(&path_a))).unwrap();
        framer::send_message(&mut client_b, &encode_request(&open(&path_b))).unwrap();

        let mut rxbuf_a = Vec::new();
        let mut rxbuf_b = Vec::new();
        let handle_a = decode_int(&read_one_response(&mut client_a, &mut rxbuf_a).returns[0]).unwrap();
        let handle_b = decode_int(&read_one_response(&mut client_b, &mut rxbuf_b).returns[0]).unwrap();

        let read_req = |h: i64| crate::codec::Request {
            op: Opcode::Read,
            params: vec![encode_int(h), vec![0; 4], encode_int(4)],
        };
        framer::send_message(&mut client_a, &encode_request(&read_req(handle_a))).unwrap();
        framer::send_message(&mut client_b, &encode_request(&read_req(handle_b))).unwrap();
        let resp_a = read_one_response(&mut client_a, &mut rxbuf_a);
        let resp_b = read_one_response(&mut client_b, &mut rxbuf_b);

        assert_eq!(&resp_a.returns[1], b"AAAA");
        assert_eq!(&resp_b.returns[1], b"BBBB");

        std::fs::remove_file(&path_a).ok();
        std::fs::remove_file(&path_b).ok();
    }

    #[test]
    fn disconnecting_one_client_mid_request_does_not_wedge_another() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        std::thread::spawn(move || {
            for stream in listener.incoming() {
                if let Ok(stream) = stream {
                    std::thread::spawn(move || {
                        let _ = serve_connection(stream);
                    });
                }
            }
        });

        // A client that writes a partial, malformed frame and vanishes.
        {
            let mut rude = ClientStream::connect(addr).unwrap();
            rude.write_all(b"Message-Length:100\r\n\r\nshort").unwrap();
        }

        let path = std::env::temp_dir().join(format!("fsrpc-wedge-{}", std::process::id()));
        std::fs::write(&path, b"still here").unwrap();
        let mut polite = ClientStream::connect(addr).unwrap();
        let open_req = crate::codec::Request {
            op: Opcode::Open,
            params: vec![
                path.to_string_lossy().into_owned().into_bytes(),
                encode_int(libc::O_RDONLY as i64),
                encode_int(0),
            ],
        };
        framer::send_message(&mut polite, &encode_request(&open_req)).unwrap();
        let mut rxbuf = Vec::new();
        let resp = read_one_response(&mut polite, &mut rxbuf);
        assert_eq!(resp.err, 0);

        std::fs::remove_file(&path).ok();
    }
}
