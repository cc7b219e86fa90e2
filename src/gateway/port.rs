// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Ephemeral loopback port allocation.

use std::io;
use std::net::{Ipv4Addr, SocketAddr, TcpListener};

/// Ask the OS for a free loopback TCP port and release it immediately.
///
/// Another process may claim the port between this call and the caller's
/// bind. The gateway itself binds its bridge listener directly and keeps it;
/// this helper is for callers that can only pass a port number on.
pub fn free_port() -> io::Result<u16> {
    let listener = TcpListener::bind(SocketAddr::from((Ipv4Addr::LOCALHOST, 0)))?;
    Ok(listener.local_addr()?.port())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn returns_a_bindable_port() {
        let port = free_port().unwrap();
        assert_ne!(port, 0);
        TcpListener::bind(SocketAddr::from((Ipv4Addr::LOCALHOST, port))).unwrap();
    }
}
