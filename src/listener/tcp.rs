// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Stream transport.
//!
//! Each accepted connection is served by its own task and carries
//! newline-delimited messages. Lines of one connection are processed in
//! order. Nothing is written back to the peer.
//!
//! A line is processed synchronously once read, so a connection task only
//! ever yields while waiting for input. Aborting it on shutdown therefore
//! never cuts a message in half; a partial line still in the buffer is
//! discarded.

use std::io;
use std::net::SocketAddr;
use std::time::Duration;

use tokio::io::{AsyncBufRead, AsyncBufReadExt, BufReader};
use tokio::net::{TcpListener, TcpSocket, TcpStream};
use tokio::task::JoinSet;

use crate::error::{BindError, DecodeError};

use super::session::Session;

const LISTEN_BACKLOG: u32 = 1024;

/// Pause after a failed accept, so descriptor exhaustion does not spin.
const ACCEPT_BACKOFF: Duration = Duration::from_millis(100);

/// Binds and listens on the stream socket.
pub(crate) fn bind(addr: SocketAddr) -> Result<TcpListener, BindError> {
    let socket = if addr.is_ipv4() {
        TcpSocket::new_v4()
    } else {
        TcpSocket::new_v6()
    }
    .map_err(|e| BindError::from_io(addr, e))?;

    // Lets a restart rebind while old connections sit in TIME_WAIT
    #[cfg(unix)]
    socket
        .set_reuseaddr(true)
        .map_err(|e| BindError::from_io(addr, e))?;

    socket.bind(addr).map_err(|e| BindError::from_io(addr, e))?;
    socket
        .listen(LISTEN_BACKLOG)
        .map_err(|e| BindError::from_io(addr, e))
}

/// Accepts connections until the session is cancelled, then closes them.
pub(crate) async fn serve(listener: TcpListener, session: Session) {
    let mut connections = JoinSet::new();

    loop {
        tokio::select! {
            biased;
            () = session.cancel.cancelled() => break,
            Some(_) = connections.join_next(), if !connections.is_empty() => {}
            result = listener.accept() => match result {
                Ok((stream, peer)) => {
                    session.stats.record_connection();
                    tracing::debug!(peer = %peer, "Connection accepted");
                    connections.spawn(serve_connection(stream, peer, session.clone()));
                }
                Err(e) => {
                    tracing::warn!(error = %e, "Failed to accept connection");
                    tokio::time::sleep(ACCEPT_BACKOFF).await;
                }
            },
        }
    }

    // Release the port before closing connections
    drop(listener);

    let open = connections.len();
    if open > 0 {
        tracing::debug!(connections = open, "Closing connections");
        connections.shutdown().await;
    }

    tracing::debug!("Accept loop stopped");
}

async fn serve_connection(stream: TcpStream, peer: SocketAddr, session: Session) {
    let mut reader = BufReader::new(stream);
    let mut line = Vec::new();

    loop {
        match read_line(&mut reader, &mut line, session.max_line_bytes).await {
            Ok(LineRead::Line) => {
                if line.iter().all(u8::is_ascii_whitespace) {
                    continue;
                }
                let now = session.now();
                session.handle(&line, now);
            }
            Ok(LineRead::TooLong(len)) => {
                session.stats.record_message();
                session.stats.record_decode_failure();
                let error = DecodeError::LineTooLong {
                    len,
                    max: session.max_line_bytes,
                };
                tracing::warn!(peer = %peer, error = %error, "Discarding line");
            }
            Ok(LineRead::Eof) => {
                tracing::debug!(peer = %peer, "Connection closed by peer");
                break;
            }
            Err(e) => {
                tracing::debug!(peer = %peer, error = %e, "Connection read failed");
                break;
            }
        }
    }
}

/// Result of reading one newline-delimited line.
#[derive(Debug, PartialEq, Eq)]
enum LineRead {
    /// A line is in the buffer, without its terminator.
    Line,
    /// The line exceeded the limit and was discarded. Carries its length.
    TooLong(usize),
    /// The peer closed the stream.
    Eof,
}

/// Reads up to the next `\n` into `buf`, never buffering more than `max`
/// bytes.
///
/// A final line without a terminator is returned before [`LineRead::Eof`].
async fn read_line<R>(reader: &mut R, buf: &mut Vec<u8>, max: usize) -> io::Result<LineRead>
where
    R: AsyncBufRead + Unpin,
{
    buf.clear();
    let mut discarded = 0usize;

    loop {
        let available = reader.fill_buf().await?;
        if available.is_empty() {
            return Ok(if discarded > 0 {
                LineRead::TooLong(discarded)
            } else if buf.is_empty() {
                LineRead::Eof
            } else {
                LineRead::Line
            });
        }

        let newline = available.iter().position(|b| *b == b'\n');
        let chunk = &available[..newline.unwrap_or(available.len())];

        if discarded > 0 || buf.len() + chunk.len() > max {
            discarded += buf.len() + chunk.len();
            buf.clear();
        } else {
            buf.extend_from_slice(chunk);
        }

        let consumed = chunk.len() + usize::from(newline.is_some());
        reader.consume(consumed);

        if newline.is_some() {
            if discarded > 0 {
                return Ok(LineRead::TooLong(discarded));
            }
            if buf.last() == Some(&b'\r') {
                buf.pop();
            }
            return Ok(LineRead::Line);
        }
    }
}
