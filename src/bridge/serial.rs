// Copyright 2026 Daniel Pelikan
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! RFCOMM serial link state machine.
//!
//! Wraps one outbound serial connection: a cancellable read loop that
//! delivers every chunk as one frame, and a blocking write path. The
//! state machine is generic over the stream so tests run it against an
//! in-memory duplex; [`super::rfcomm`] supplies the real BlueZ stream.

use bluer::Address;
use parking_lot::Mutex;
use std::sync::Arc;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;

use super::ble_constants::{timing::INTER_READ_PAUSE, FRAME_QUEUE_DEPTH, SERIAL_READ_BUFFER};
use crate::diag::{DiagnosticSink, Direction};
use crate::error::LinkError;

/// State of the serial client role.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SerialState {
    Disconnected,
    Connecting,
    Connected,
}

/// Connection fields guarded by one lock: `peer` is `Some` iff `state`
/// is `Connected`.
#[derive(Debug)]
struct Shared {
    state: SerialState,
    peer: Option<Address>,
}

type BoxedWriter = Box<dyn AsyncWrite + Send + Unpin>;
type SharedWriter = Arc<tokio::sync::Mutex<Option<BoxedWriter>>>;

/// RFCOMM serial client link.
pub struct SerialLink {
    shared: Arc<Mutex<Shared>>,
    writer: SharedWriter,
    inbound_tx: mpsc::Sender<Vec<u8>>,
    shutdown_tx: Mutex<Option<watch::Sender<bool>>>,
    diag: Arc<dyn DiagnosticSink>,
}

impl SerialLink {
    /// Create a new serial link and the receiving end of its inbound queue.
    pub fn new(diag: Arc<dyn DiagnosticSink>) -> (Arc<Self>, mpsc::Receiver<Vec<u8>>) {
        let (inbound_tx, inbound_rx) = mpsc::channel(FRAME_QUEUE_DEPTH);
        let link = Arc::new(Self {
            shared: Arc::new(Mutex::new(Shared {
                state: SerialState::Disconnected,
                peer: None,
            })),
            writer: Arc::new(tokio::sync::Mutex::new(None)),
            inbound_tx,
            shutdown_tx: Mutex::new(None),
            diag,
        });
        (link, inbound_rx)
    }

    pub fn state(&self) -> SerialState {
        self.shared.lock().state
    }

    pub fn peer(&self) -> Option<Address> {
        self.shared.lock().peer
    }

    /// A connect attempt is underway.
    pub fn connecting(&self) {
        let mut shared = self.shared.lock();
        shared.state = SerialState::Connecting;
        shared.peer = None;
    }

    /// The connect attempt failed; reported once by the caller.
    pub fn connect_failed(&self) {
        let mut shared = self.shared.lock();
        shared.state = SerialState::Disconnected;
        shared.peer = None;
    }

    /// Adopt an established stream and start the read-loop worker.
    ///
    /// The returned handle completes when the loop exits (EOF, I/O error,
    /// or [`close`](Self::close)).
    pub async fn attach<S>(&self, stream: S, peer: Address) -> JoinHandle<()>
    where
        S: AsyncRead + AsyncWrite + Send + Unpin + 'static,
    {
        let (reader, writer) = tokio::io::split(stream);
        *self.writer.lock().await = Some(Box::new(writer));

        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        *self.shutdown_tx.lock() = Some(shutdown_tx);

        {
            let mut shared = self.shared.lock();
            shared.state = SerialState::Connected;
            shared.peer = Some(peer);
        }

        let worker = ReadWorker {
            shared: self.shared.clone(),
            writer: self.writer.clone(),
            inbound_tx: self.inbound_tx.clone(),
            diag: self.diag.clone(),
        };
        tokio::spawn(worker.run(reader, shutdown_rx))
    }

    /// Write a payload to the open socket.
    ///
    /// Dropped with a diagnostic when the link is not connected. Blocking
    /// write, no outbound queue; a disconnect racing an in-flight send
    /// surfaces as a transport failure of that send.
    pub async fn write(&self, payload: &[u8]) {
        if self.state() != SerialState::Connected {
            self.diag.frame(Direction::RfcommTxDropped, payload);
            return;
        }

        self.diag.frame(Direction::RfcommTx, payload);

        let mut guard = self.writer.lock().await;
        let result = match guard.as_mut() {
            Some(writer) => async {
                writer.write_all(payload).await?;
                writer.flush().await
            }
            .await,
            None => Err(std::io::Error::new(
                std::io::ErrorKind::NotConnected,
                "link closed during send",
            )),
        };
        drop(guard);

        if let Err(err) = result {
            self.diag.event(&format!("RFCOMM write failed: {}", err));
            mark_disconnected(&self.shared, &self.writer).await;
        }
    }

    /// Stop the read loop and drop the writer; the link ends Disconnected.
    pub async fn close(&self) {
        if let Some(shutdown) = self.shutdown_tx.lock().take() {
            let _ = shutdown.send(true);
        }
        mark_disconnected(&self.shared, &self.writer).await;
    }
}

async fn mark_disconnected(shared: &Mutex<Shared>, writer: &SharedWriter) {
    writer.lock().await.take();
    let mut shared = shared.lock();
    shared.state = SerialState::Disconnected;
    shared.peer = None;
}

/// Read-loop worker; runs until the connection drops or is closed.
struct ReadWorker {
    shared: Arc<Mutex<Shared>>,
    writer: SharedWriter,
    inbound_tx: mpsc::Sender<Vec<u8>>,
    diag: Arc<dyn DiagnosticSink>,
}

impl ReadWorker {
    /// Blocking read loop: at least one byte per read, each chunk is one
    /// frame, 10 ms pause between frames. Terminates on EOF, I/O error,
    /// or shutdown; the terminating fault is reported exactly once.
    async fn run<R>(self, mut reader: R, mut shutdown: watch::Receiver<bool>)
    where
        R: AsyncRead + Send + Unpin,
    {
        let mut buf = [0u8; SERIAL_READ_BUFFER];

        loop {
            tokio::select! {
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        break;
                    }
                }
                read = reader.read(&mut buf) => match read {
                    Ok(0) => {
                        self.diag.event("RFCOMM connection closed by remote");
                        break;
                    }
                    Ok(n) => {
                        let frame = buf[..n].to_vec();
                        self.diag.frame(Direction::RfcommRx, &frame);
                        if self.inbound_tx.send(frame).await.is_err() {
                            break;
                        }
                        tokio::time::sleep(INTER_READ_PAUSE).await;
                    }
                    Err(err) => {
                        self.diag.event(&LinkError::ReadLoop(err).to_string());
                        break;
                    }
                },
            }
        }

        mark_disconnected(&self.shared, &self.writer).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::diag::MemorySink;
    use tokio::io::duplex;

    fn peer() -> Address {
        Address::new([0xAA, 0xBB, 0xCC, 0xDD, 0xEE, 0xFF])
    }

    fn test_link() -> (Arc<SerialLink>, mpsc::Receiver<Vec<u8>>, Arc<MemorySink>) {
        let sink = Arc::new(MemorySink::new());
        let (link, inbound) = SerialLink::new(sink.clone());
        (link, inbound, sink)
    }

    #[tokio::test]
    async fn test_connect_state_transitions() {
        let (link, _inbound, _sink) = test_link();
        assert_eq!(link.state(), SerialState::Disconnected);

        link.connecting();
        assert_eq!(link.state(), SerialState::Connecting);
        assert!(link.peer().is_none());

        link.connect_failed();
        assert_eq!(link.state(), SerialState::Disconnected);

        let (local, _remote) = duplex(64);
        let _loop_handle = link.attach(local, peer()).await;
        assert_eq!(link.state(), SerialState::Connected);
        assert_eq!(link.peer(), Some(peer()));
    }

    #[tokio::test]
    async fn test_write_reaches_remote_end() {
        let (link, _inbound, _sink) = test_link();
        let (local, mut remote) = duplex(64);
        let _loop_handle = link.attach(local, peer()).await;

        link.write(b"01 0C\r").await;

        let mut buf = [0u8; 32];
        let n = remote.read(&mut buf).await.unwrap();
        assert_eq!(&buf[..n], b"01 0C\r");
    }

    #[tokio::test]
    async fn test_write_dropped_when_disconnected() {
        let (link, _inbound, sink) = test_link();

        link.write(b"01 0C\r").await;

        assert!(sink
            .messages()
            .iter()
            .any(|m| m.starts_with("DROPPING RFCM TX:")));
    }

    #[tokio::test]
    async fn test_read_loop_delivers_chunks_as_frames() {
        let (link, mut inbound, sink) = test_link();
        let (local, mut remote) = duplex(64);
        let _loop_handle = link.attach(local, peer()).await;

        remote.write_all(b"41 0C 1A F8\r").await.unwrap();
        remote.flush().await.unwrap();

        assert_eq!(inbound.recv().await.unwrap(), b"41 0C 1A F8\r");
        assert!(sink.messages().iter().any(|m| m.starts_with("RFCM RX:")));
    }

    #[tokio::test]
    async fn test_remote_close_disconnects() {
        let (link, _inbound, sink) = test_link();
        let (local, remote) = duplex(64);
        let loop_handle = link.attach(local, peer()).await;

        drop(remote);
        loop_handle.await.unwrap();

        assert_eq!(link.state(), SerialState::Disconnected);
        assert!(link.peer().is_none());
        assert!(sink
            .messages()
            .iter()
            .any(|m| m.contains("closed by remote")));
    }

    #[tokio::test]
    async fn test_close_stops_read_loop() {
        let (link, _inbound, _sink) = test_link();
        let (local, _remote) = duplex(64);
        let loop_handle = link.attach(local, peer()).await;

        link.close().await;
        loop_handle.await.unwrap();

        assert_eq!(link.state(), SerialState::Disconnected);
    }
}
