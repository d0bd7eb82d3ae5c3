// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 wsdscan contributors

//! Multicast socket plumbing for the WSD group.
//!
//! Listener sockets bind the group port with address reuse so they coexist
//! with other WSD clients on the host. Only the IPv4 group is joined; the
//! IPv6 group (`FF02::C`) is carried as a constant for callers that want to
//! open their own v6 listener but is not joined here.

use std::net::{Ipv4Addr, SocketAddrV4};

use socket2::{Domain, Protocol, Socket, Type};
use tokio::net::UdpSocket;
use tracing::warn;

use crate::config::{WSD_MULTICAST_GROUP, WSD_PORT};
use crate::error::Result;

/// WS-Discovery link-local IPv6 group (not joined; v6 discovery inactive).
pub const WSD_MULTICAST_GROUP_V6: &str = "FF02::C";

/// Open one listener socket joined to the WSD IPv4 group on `port`.
///
/// A failed group join is downgraded to a warning: the socket still
/// receives unicast datagrams on the port, which keeps directed exchanges
/// and tests working on hosts without multicast routing.
pub fn open_listener(port: u16) -> Result<UdpSocket> {
    let socket = Socket::new(Domain::IPV4, Type::DGRAM, Some(Protocol::UDP))?;
    socket.set_reuse_address(true)?;
    socket.set_nonblocking(true)?;
    socket.bind(&SocketAddrV4::new(Ipv4Addr::UNSPECIFIED, port).into())?;
    if let Err(e) = socket.join_multicast_v4(&WSD_MULTICAST_GROUP, &Ipv4Addr::UNSPECIFIED) {
        warn!(group = %WSD_MULTICAST_GROUP, error = %e, "multicast join failed");
    }
    Ok(UdpSocket::from_std(socket.into())?)
}

/// The default announcement listener set: one IPv4 socket on the well-known
/// port.
pub fn open_listeners() -> Result<Vec<UdpSocket>> {
    Ok(vec![open_listener(WSD_PORT)?])
}

/// An ephemeral socket for sending Probe datagrams to the group, TTL 1.
pub async fn send_socket() -> Result<UdpSocket> {
    let socket = Socket::new(Domain::IPV4, Type::DGRAM, Some(Protocol::UDP))?;
    socket.set_nonblocking(true)?;
    socket.set_multicast_ttl_v4(1)?;
    socket.bind(&SocketAddrV4::new(Ipv4Addr::UNSPECIFIED, 0).into())?;
    Ok(UdpSocket::from_std(socket.into())?)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_listener_binds_requested_port() {
        // an unprivileged high port; join may fail, bind must not
        let sock = open_listener(13702).unwrap();
        assert_eq!(sock.local_addr().unwrap().port(), 13702);
    }

    #[tokio::test]
    async fn test_send_socket_is_usable() {
        let sock = send_socket().await.unwrap();
        assert_eq!(sock.local_addr().unwrap().ip(), Ipv4Addr::UNSPECIFIED);
    }
}
