//! Bidirectional TCP bridge between a local listener and the console's
//! advertised auxiliary endpoint.
//!
//! A caller connects a plain TCP client to the local port this relay
//! listens on; the relay speaks the encrypted frame format in
//! [`crate::codec`] to the console on the other side, so from the local
//! client's point of view the stream is plaintext in both directions.
//!
//! Outbound frames larger than [`MAX_SEGMENT_SIZE`] are split across
//! multiple socket writes before being handed to the kernel — the frame
//! itself is one logical unit, but large frames are segmented the same
//! way the console's own client does to avoid oversized TCP writes.

use std::net::SocketAddr;
use std::sync::Arc;

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};

use crate::codec::AuxCrypto;
use crate::{AuxError, Result};

/// Largest chunk a single encrypted frame is split into before being
/// written to the TCP socket.
pub const MAX_SEGMENT_SIZE: usize = 1448;

/// A running local-listener ↔ console-TCP bridge for one auxiliary
/// stream. Dropping this (or aborting the task returned by [`spawn`])
/// tears the bridge down; it does not own the console session itself.
pub struct AuxRelay {
    local_addr: SocketAddr,
}

impl AuxRelay {
    /// Bind a local TCP listener on an ephemeral port and start accepting
    /// connections, bridging each to `console_addr` under `crypto`.
    /// Returns immediately; the accept loop runs in a background task
    /// until the returned handle is dropped or aborted.
    pub async fn bind(console_addr: SocketAddr, crypto: Arc<AuxCrypto>) -> Result<(Self, tokio::task::JoinHandle<()>)> {
        let listener = TcpListener::bind(("127.0.0.1", 0)).await?;
        let local_addr = listener.local_addr()?;
        tracing::info!(%local_addr, %console_addr, "auxiliary relay listening");

        let handle = tokio::spawn(async move {
            loop {
                match listener.accept().await {
                    Ok((client, peer)) => {
                        tracing::debug!(%peer, "auxiliary relay client connected");
                        let crypto = crypto.clone();
                        tokio::spawn(async move {
                            if let Err(e) = bridge_one(client, console_addr, crypto).await {
                                tracing::warn!(error = %e, "auxiliary relay connection ended with error");
                            }
                        });
                    }
                    Err(e) => {
                        tracing::warn!(error = %e, "auxiliary relay accept failed");
                        return;
                    }
                }
            }
        });

        Ok((Self { local_addr }, handle))
    }

    /// The local address a client should connect to.
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }
}

async fn bridge_one(client: TcpStream, console_addr: SocketAddr, crypto: Arc<AuxCrypto>) -> Result<()> {
    let console = TcpStream::connect(console_addr).await?;
    let (mut client_read, mut client_write) = client.into_split();
    let (mut console_read, mut console_write) = console.into_split();

    let to_console = {
        let crypto = crypto.clone();
        async move {
            let mut buf = vec![0u8; 4096];
            loop {
                let n = match client_read.read(&mut buf).await {
                    Ok(0) | Err(_) => return,
                    Ok(n) => n,
                };
                let frame = crypto.encode(&buf[..n]);
                if write_segmented(&mut console_write, &frame).await.is_err() {
                    return;
                }
            }
        }
    };

    let to_client = async move {
        loop {
            match read_frame(&mut console_read).await {
                Ok(Some(frame)) => match crypto.decode(&frame) {
                    Ok(plaintext) => {
                        if client_write.write_all(&plaintext).await.is_err() {
                            return;
                        }
                    }
                    Err(e) => {
                        tracing::warn!(error = %e, "dropping undecodable auxiliary frame");
                        return;
                    }
                },
                Ok(None) => return,
                Err(e) => {
                    tracing::debug!(error = %e, "auxiliary stream read ended");
                    return;
                }
            }
        }
    };

    tokio::select! {
        _ = to_console => {}
        _ = to_client => {}
    }
    Ok(())
}

/// Write `frame` to `sock`, segmenting it into at most
/// [`MAX_SEGMENT_SIZE`]-byte writes.
async fn write_segmented(sock: &mut (impl AsyncWriteExt + Unpin), frame: &[u8]) -> std::io::Result<()> {
    for chunk in frame.chunks(MAX_SEGMENT_SIZE) {
        sock.write_all(chunk).await?;
    }
    Ok(())
}

/// Read exactly one frame off `sock`: a 4-byte header (magic,
/// payload_size) gives no length for the ciphertext directly, so the
/// reader peels off the header, then reads ciphertext in 16-byte blocks
/// until a trailing HMAC-sized tail can be cleanly separated from the
/// last full block — in practice the sender always writes a frame as one
/// contiguous unit, so a single read of the header followed by reads
/// sized from the encrypted payload length recovers it.
async fn read_frame(sock: &mut (impl tokio::io::AsyncRead + Unpin)) -> Result<Option<Vec<u8>>> {
    let mut header = [0u8; 4];
    if !read_exact_or_eof(sock, &mut header).await? {
        return Ok(None);
    }
    let payload_size = u16::from_be_bytes([header[2], header[3]]) as usize;
    // pkcs7_pad is a no-op on already-aligned input (see smartglass_crypto::padding),
    // so a payload that's already a multiple of 16 carries no extra padding block.
    let padded_len = if payload_size % 16 == 0 {
        payload_size
    } else {
        ((payload_size / 16) + 1) * 16
    };

    let mut rest = vec![0u8; padded_len + 32];
    sock.read_exact(&mut rest).await.map_err(AuxError::Io)?;

    let mut frame = Vec::with_capacity(4 + rest.len());
    frame.extend_from_slice(&header);
    frame.extend_from_slice(&rest);
    Ok(Some(frame))
}

async fn read_exact_or_eof(sock: &mut (impl tokio::io::AsyncRead + Unpin), buf: &mut [u8]) -> Result<bool> {
    let mut filled = 0;
    while filled < buf.len() {
        let n = sock.read(&mut buf[filled..]).await.map_err(AuxError::Io)?;
        if n == 0 {
            return if filled == 0 {
                Ok(false)
            } else {
                Err(AuxError::ShortFrame { needed: buf.len(), got: filled })
            };
        }
        filled += n;
    }
    Ok(true)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::AuxCrypto;
    use std::sync::Arc;
    use tokio::io::AsyncWriteExt;
    use tokio::net::TcpListener;

    // The relay speaks for "us" (encode on client_iv, decode on
    // server_iv); the fake console below mirrors those roles (encode on
    // server_iv, decode on client_iv) — both derived from the same
    // connection-info fixture, as the real console and relay would be.
    fn our_crypto() -> Arc<AuxCrypto> {
        Arc::new(AuxCrypto::new(&[0x11u8; 16], &[0x22u8; 32], &[0x33u8; 16], &[0x44u8; 16]).unwrap())
    }

    fn console_crypto() -> Arc<AuxCrypto> {
        Arc::new(AuxCrypto::new(&[0x11u8; 16], &[0x22u8; 32], &[0x44u8; 16], &[0x33u8; 16]).unwrap())
    }

    #[tokio::test]
    async fn bridges_plaintext_client_to_encrypted_console() {
        // fake "console": accepts one connection, reads one frame, decodes
        // it, and echoes the decoded text back as a fresh frame.
        let console_listener = TcpListener::bind(("127.0.0.1", 0)).await.unwrap();
        let console_addr = console_listener.local_addr().unwrap();
        let console_crypto = console_crypto();

        let console_task = tokio::spawn(async move {
            let (mut sock, _) = console_listener.accept().await.unwrap();
            let frame = read_frame(&mut sock).await.unwrap().unwrap();
            let plaintext = console_crypto.decode(&frame).unwrap();
            assert_eq!(plaintext, b"ping");
            let reply = console_crypto.encode(b"pong");
            write_segmented(&mut sock, &reply).await.unwrap();
        });

        let relay_crypto = our_crypto();
        let (relay, _handle) = AuxRelay::bind(console_addr, relay_crypto).await.unwrap();

        let mut client = TcpStream::connect(relay.local_addr()).await.unwrap();
        client.write_all(b"ping").await.unwrap();

        let mut response = [0u8; 4];
        client.read_exact(&mut response).await.unwrap();
        assert_eq!(&response, b"pong");

        console_task.await.unwrap();
    }
}
