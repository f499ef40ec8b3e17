// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! HTTP endpoint receiving commands from IFTTT applets.

use std::net::{IpAddr, Ipv4Addr, SocketAddr};

use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use warp::Filter;
use warp::http::StatusCode;

use crate::engine::CommandMailbox;
use crate::error::{ConfigError, Result, TransportError};

/// Listens for `GET /<secret>/command/<TOKEN>` and deposits `TOKEN` into a
/// [`CommandMailbox`].
///
/// The token is not validated here; the polling engine decodes it when it
/// drains the mailbox. Any other request is answered with `404`.
#[derive(Debug)]
pub struct CommandReceiver {
    addr: SocketAddr,
    shutdown_tx: Option<oneshot::Sender<()>>,
    server_handle: Option<JoinHandle<()>>,
}

impl CommandReceiver {
    /// Binds `0.0.0.0:<port>` and starts serving. Port 0 picks a free port.
    ///
    /// Must be called from within a tokio runtime.
    ///
    /// # Errors
    ///
    /// - [`ConfigError::Invalid`] if `secret` is empty or contains `/`
    /// - [`TransportError::Bind`] if the port cannot be bound
    pub fn start(port: u16, secret: &str, mailbox: CommandMailbox) -> Result<Self> {
        if secret.is_empty() || secret.contains('/') {
            return Err(ConfigError::invalid(
                "ifttt.receiver_secret",
                "must be a non-empty path segment",
            )
            .into());
        }

        let route = warp::get()
            .and(warp::path(secret.to_string()))
            .and(warp::path("command"))
            .and(warp::path::param::<String>())
            .and(warp::path::end())
            .map(move |token: String| {
                tracing::info!(command = %token, "Received command over HTTP");
                mailbox.deposit(token);
                warp::reply::with_status("OK", StatusCode::OK)
            });

        let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();
        let (addr, server) = warp::serve(route)
            .try_bind_with_graceful_shutdown(
                SocketAddr::new(IpAddr::V4(Ipv4Addr::UNSPECIFIED), port),
                async move {
                    let _ = shutdown_rx.await;
                },
            )
            .map_err(|e| TransportError::Bind(format!("port {port}: {e}")))?;

        tracing::info!(addr = %addr, "Command receiver listening");
        let server_handle = tokio::spawn(server);

        Ok(Self {
            addr,
            shutdown_tx: Some(shutdown_tx),
            server_handle: Some(server_handle),
        })
    }

    /// Returns the address the server is bound to.
    #[must_use]
    pub fn local_addr(&self) -> SocketAddr {
        self.addr
    }

    /// Stops accepting requests and waits for in-flight ones to finish.
    pub async fn shutdown(mut self) {
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(());
        }
        if let Some(handle) = self.server_handle.take() {
            let _ = handle.await;
        }
        tracing::info!(addr = %self.addr, "Command receiver stopped");
    }
}

impl Drop for CommandReceiver {
    fn drop(&mut self) {
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_bad_secret() {
        let mailbox = CommandMailbox::new();
        assert!(CommandReceiver::start(0, "", mailbox.clone()).is_err());
        assert!(CommandReceiver::start(0, "a/b", mailbox).is_err());
    }
}
