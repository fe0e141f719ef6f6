// SPDX-License-Identifier: MPL-2.0

//! Minimal standalone demo: wires console line 0 to real stdin/stdout
//! through the line discipline and echoes canonical lines back, typed
//! input and all — a manual smoke test for the dispatcher's event loop,
//! the std-process equivalent of the teacher's `ktest` harness.

use std::thread;
use std::time::Duration;

use tty_ldisc::{Config, DeviceKind, Request, Server};

fn main() {
    env_logger::init();

    let config = Config {
        n_cons: 1,
        n_serial: 0,
        n_pty: 0,
        ..Config::default()
    };
    let mut server = Server::new(
        config,
        |_idx, _kind| DeviceKind::Console(tty_ldisc::ConsoleBackend::new()),
        |pgrp, sig| log::info!("pgrp {pgrp}: signal {sig:?}"),
    );

    server.dispatch(1, 0, Request::Open { no_noctty: false });
    println!("type a line and press enter (Ctrl-D to quit):");

    loop {
        server.handle_events(0);
        let reply = server.dispatch(1, 0, Request::Read { count: 1024, nonblock: true });
        match reply {
            tty_ldisc::Reply::ReadDone { data } if data.is_empty() => break,
            tty_ldisc::Reply::ReadDone { data } => {
                server.dispatch(1, 0, Request::Write { data, nonblock: false });
            }
            _ => thread::sleep(Duration::from_millis(20)),
        }
    }
}
