//! Standalone server binary: binds the endpoint from the environment
//! (`server15440`/`serverport15440`, defaulting to `127.0.0.1:20080`) and
//! serves connections until killed.

use fsrpc::config::Endpoint;
use fsrpc::server::listener;

fn main() -> std::io::Result<()> {
    let endpoint = Endpoint::from_env();
    listener::run(&endpoint)
}
