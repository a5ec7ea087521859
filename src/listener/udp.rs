// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Datagram transport.
//!
//! Every datagram is one message. The sender is acknowledged with
//! `"<utc_seconds>;1"` before the payload is decoded, so a sensor gets its
//! acknowledgement even for a record this library ignores.

use std::net::SocketAddr;

use tokio::net::UdpSocket;

use crate::error::BindError;

use super::session::Session;

/// Largest payload a single UDP datagram can carry.
const MAX_DATAGRAM_BYTES: usize = 65_535;

/// Binds the datagram socket.
pub(crate) async fn bind(addr: SocketAddr) -> Result<UdpSocket, BindError> {
    UdpSocket::bind(addr)
        .await
        .map_err(|e| BindError::from_io(addr, e))
}

/// Formats the acknowledgement for a datagram received at `now`.
pub(crate) fn ack(now: i64) -> String {
    format!("{now};1")
}

/// Receives datagrams until the session is cancelled.
///
/// Datagrams are processed one at a time, in arrival order.
pub(crate) async fn serve(socket: UdpSocket, session: Session) {
    let mut buf = vec![0u8; MAX_DATAGRAM_BYTES];

    loop {
        let (len, peer) = tokio::select! {
            biased;
            () = session.cancel.cancelled() => break,
            result = socket.recv_from(&mut buf) => match result {
                Ok(received) => received,
                Err(e) => {
                    // ICMP errors from earlier sends surface here on some platforms
                    tracing::debug!(error = %e, "Datagram receive failed");
                    continue;
                }
            },
        };

        let now = session.now();
        let sent = match socket.send_to(ack(now).as_bytes(), peer).await {
            Ok(_) => true,
            Err(e) => {
                tracing::debug!(peer = %peer, error = %e, "Failed to acknowledge datagram");
                false
            }
        };
        session.stats.record_ack(sent);

        tracing::trace!(peer = %peer, len, "Datagram received");
        session.handle(&buf[..len], now);
    }

    tracing::debug!("Datagram loop stopped");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ack_format() {
        assert_eq!(ack(1_700_000_000), "1700000000;1");
        assert_eq!(ack(0), "0;1");
    }
}
