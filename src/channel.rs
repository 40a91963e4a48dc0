//! A communication channel used to send/receive messages to/from another party.
//!
//! Both parties of a punctured-PRF session talk through an implementation of
//! [`Channel`]. Messages are opaque byte payloads tagged with the protocol phase
//! they belong to; the channel must deliver them reliably and in order.

use std::{
    fmt,
    future::Future,
    sync::atomic::{AtomicUsize, Ordering},
    time::Duration,
};

use serde::{Serialize, de::DeserializeOwned};
use tokio::{
    sync::{
        Mutex,
        mpsc::{Receiver, Sender, channel, error::SendError},
    },
    time::timeout,
};
use tracing::{debug, trace};

/// Errors related to sending / receiving / (de-)serializing messages.
#[derive(Debug, thiserror::Error)]
#[error("channel error during {phase}: {reason:?}")]
pub struct Error {
    /// The protocol phase during which the error occurred.
    pub phase: String,
    /// The specific error that was raised.
    pub reason: ErrorKind,
}

/// The specific error that occurred when trying to send / receive a message.
#[derive(Debug)]
pub enum ErrorKind {
    /// The (serialized) message could not be received over the channel.
    RecvError(String),
    /// The (serialized) message could not be sent over the channel.
    SendError(String),
    /// The message could not be (de-)serialized.
    SerdeError(String),
    /// The message is a Vec, but not of the expected length.
    InvalidLength {
        /// The length implied by the protocol.
        expected: usize,
        /// The length of the received Vec.
        actual: usize,
    },
}

/// A communication channel used to send/receive messages to/from another party.
pub trait Channel {
    /// The error that can occur sending messages over the channel.
    type SendError: fmt::Debug;
    /// The error that can occur receiving messages over the channel.
    type RecvError: fmt::Debug;

    /// Sends a message to the party with the given index (must be between `0..participants`).
    fn send_bytes_to(
        &self,
        party: usize,
        msg: Vec<u8>,
        phase: &str,
    ) -> impl Future<Output = Result<(), Self::SendError>> + Send;

    /// Awaits a response from the party with the given index (must be between `0..participants`).
    fn recv_bytes_from(
        &self,
        party: usize,
        phase: &str,
    ) -> impl Future<Output = Result<Vec<u8>, Self::RecvError>> + Send;
}

/// Serializes and sends a message to the other party.
pub(crate) async fn send_to<S: Serialize + ?Sized>(
    channel: &impl Channel,
    party: usize,
    phase: &str,
    msg: &S,
) -> Result<(), Error> {
    let msg = bincode::serialize(msg).map_err(|e| Error {
        phase: format!("sending {phase}"),
        reason: ErrorKind::SerdeError(format!("{e:?}")),
    })?;
    channel
        .send_bytes_to(party, msg, phase)
        .await
        .map_err(|e| Error {
            phase: phase.to_string(),
            reason: ErrorKind::SendError(format!("{e:?}")),
        })
}

/// Receives and deserializes a message from the other party.
pub(crate) async fn recv_from<T: DeserializeOwned>(
    channel: &impl Channel,
    party: usize,
    phase: &str,
) -> Result<T, Error> {
    let msg = channel
        .recv_bytes_from(party, phase)
        .await
        .map_err(|e| Error {
            phase: phase.to_string(),
            reason: ErrorKind::RecvError(format!("{e:?}")),
        })?;
    bincode::deserialize(&msg).map_err(|e| Error {
        phase: format!("receiving {phase}"),
        reason: ErrorKind::SerdeError(format!("{e:?}")),
    })
}

/// Receives and deserializes a Vec from the other party (while checking the length).
pub(crate) async fn recv_vec_from<T: DeserializeOwned>(
    channel: &impl Channel,
    party: usize,
    phase: &str,
    len: usize,
) -> Result<Vec<T>, Error> {
    let v: Vec<T> = recv_from(channel, party, phase).await?;
    if v.len() == len {
        Ok(v)
    } else {
        Err(Error {
            phase: phase.to_string(),
            reason: ErrorKind::InvalidLength {
                expected: len,
                actual: v.len(),
            },
        })
    }
}

/// Traffic counters of a [`SimpleChannel`].
///
/// Sizes are payload bytes as handed to [`Channel::send_bytes_to`], without
/// the chunk headers.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct Stats {
    /// Number of sent messages.
    pub send_count: usize,
    /// Number of sent bytes.
    pub send_size: usize,
    /// Number of received messages.
    pub recv_count: usize,
    /// Number of received bytes.
    pub recv_size: usize,
}

#[derive(Debug, Default)]
struct Counters {
    send_count: AtomicUsize,
    send_size: AtomicUsize,
    recv_count: AtomicUsize,
    recv_size: AtomicUsize,
}

/// A simple in-memory channel using [`Sender`] and [`Receiver`].
#[derive(Debug)]
pub struct SimpleChannel {
    s: Vec<Option<Sender<Vec<u8>>>>,
    r: Vec<Option<Mutex<Receiver<Vec<u8>>>>>,
    counters: Counters,
}

const CHUNK_SIZE: usize = 100 * 1024 * 1024;
const RECV_TIMEOUT: Duration = Duration::from_secs(10 * 60);

impl SimpleChannel {
    /// Creates channels for N parties to communicate with each other.
    pub fn channels(parties: usize) -> Vec<Self> {
        let buffer_capacity = 1024;
        let mut channels: Vec<_> = (0..parties)
            .map(|_| SimpleChannel {
                s: (0..parties).map(|_| None).collect(),
                r: (0..parties).map(|_| None).collect(),
                counters: Counters::default(),
            })
            .collect();
        for a in 0..parties {
            for b in (a + 1)..parties {
                let (send_a_to_b, recv_a_to_b) = channel(buffer_capacity);
                let (send_b_to_a, recv_b_to_a) = channel(buffer_capacity);
                channels[a].s[b] = Some(send_a_to_b);
                channels[b].s[a] = Some(send_b_to_a);
                channels[a].r[b] = Some(Mutex::new(recv_b_to_a));
                channels[b].r[a] = Some(Mutex::new(recv_a_to_b));
            }
        }
        channels
    }

    /// Traffic sent and received over this channel so far.
    pub fn stats(&self) -> Stats {
        Stats {
            send_count: self.counters.send_count.load(Ordering::Relaxed),
            send_size: self.counters.send_size.load(Ordering::Relaxed),
            recv_count: self.counters.recv_count.load(Ordering::Relaxed),
            recv_size: self.counters.recv_size.load(Ordering::Relaxed),
        }
    }
}

/// The error raised by `send` calls of a [`SimpleChannel`].
#[derive(Debug)]
pub enum AsyncSendError {
    /// The receiving half has been dropped.
    Closed(SendError<Vec<u8>>),
    /// There is no channel to the given party.
    UnknownParty(usize),
}

/// The error raised by `recv` calls of a [`SimpleChannel`].
#[derive(Debug)]
pub enum AsyncRecvError {
    /// The channel has been closed.
    Closed,
    /// No message was received before the timeout.
    TimeoutElapsed,
    /// There is no channel to the given party.
    UnknownParty(usize),
    /// A chunk is shorter than its header.
    MalformedChunk,
}

impl Channel for SimpleChannel {
    type SendError = AsyncSendError;
    type RecvError = AsyncRecvError;

    async fn send_bytes_to(
        &self,
        p: usize,
        msg: Vec<u8>,
        phase: &str,
    ) -> Result<(), AsyncSendError> {
        let sender = self
            .s
            .get(p)
            .and_then(Option::as_ref)
            .ok_or(AsyncSendError::UnknownParty(p))?;
        debug!(party = p, bytes = msg.len(), phase, "sending msg");
        self.counters.send_count.fetch_add(1, Ordering::Relaxed);
        self.counters
            .send_size
            .fetch_add(msg.len(), Ordering::Relaxed);
        let mut chunks: Vec<_> = msg.chunks(CHUNK_SIZE).collect();
        if chunks.is_empty() {
            chunks.push(&[]);
        }
        let length = chunks.len();
        for (i, chunk) in chunks.into_iter().enumerate() {
            if length > 1 {
                trace!(party = p, chunk = i + 1, of = length, "sending chunk");
            }
            let mut msg = Vec::with_capacity(2 * 4 + chunk.len());
            msg.extend((i as u32).to_be_bytes());
            msg.extend((length as u32).to_be_bytes());
            msg.extend(chunk);
            sender.send(msg).await.map_err(AsyncSendError::Closed)?;
        }
        Ok(())
    }

    async fn recv_bytes_from(&self, p: usize, phase: &str) -> Result<Vec<u8>, AsyncRecvError> {
        let mut receiver = self
            .r
            .get(p)
            .and_then(Option::as_ref)
            .ok_or(AsyncRecvError::UnknownParty(p))?
            .lock()
            .await;
        let mut msg: Vec<u8> = vec![];
        loop {
            let chunk = match timeout(RECV_TIMEOUT, receiver.recv()).await {
                Ok(Some(bytes)) => bytes,
                Ok(None) => return Err(AsyncRecvError::Closed),
                Err(_) => return Err(AsyncRecvError::TimeoutElapsed),
            };
            let (Some(header), Some(body)) = (chunk.get(..8), chunk.get(8..)) else {
                return Err(AsyncRecvError::MalformedChunk);
            };
            let i = u32::from_be_bytes([header[0], header[1], header[2], header[3]]);
            let length = u32::from_be_bytes([header[4], header[5], header[6], header[7]]);
            msg.extend(body);
            if i + 1 >= length {
                break;
            }
        }
        debug!(party = p, bytes = msg.len(), phase, "received msg");
        self.counters.recv_count.fetch_add(1, Ordering::Relaxed);
        self.counters
            .recv_size
            .fetch_add(msg.len(), Ordering::Relaxed);
        Ok(msg)
    }
}
