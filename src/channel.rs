//! Message channel over a byte stream
//!
//! Frames are newline-delimited UTF-8 lines, applied symmetrically by
//! server and client. The write side of every socket is owned by one writer
//! task fed through a bounded queue, so frames for a single destination
//! leave in the order they were queued no matter how many connections are
//! sending to it.

use bytes::BytesMut;
use futures_util::{SinkExt, StreamExt};
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;
use tokio::task::JoinHandle;
use tokio_util::codec::{Decoder, Encoder, FramedRead, FramedWrite, LinesCodec, LinesCodecError};
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::error::{AppError, SendError};
use crate::message::{Message, MAX_FRAME_LEN};

/// Per-connection outbound queue capacity
pub const OUTBOUND_BUFFER_SIZE: usize = 256;

/// One decoded inbound frame
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Frame {
    Line(String),
    /// A line longer than `MAX_FRAME_LEN` was discarded
    TooLong,
}

/// Line codec with the protocol's maximum frame length
///
/// An over-long line decodes to `Frame::TooLong` instead of an error, so the
/// stream keeps decoding whatever follows it.
#[derive(Debug, Clone)]
pub struct ChatCodec {
    lines: LinesCodec,
}

impl ChatCodec {
    pub fn new() -> Self {
        Self {
            lines: LinesCodec::new_with_max_length(MAX_FRAME_LEN),
        }
    }
}

impl Default for ChatCodec {
    fn default() -> Self {
        Self::new()
    }
}

fn lift(decoded: Result<Option<String>, LinesCodecError>) -> Result<Option<Frame>, LinesCodecError> {
    match decoded {
        Ok(line) => Ok(line.map(Frame::Line)),
        Err(LinesCodecError::MaxLineLengthExceeded) => Ok(Some(Frame::TooLong)),
        Err(e) => Err(e),
    }
}

impl Decoder for ChatCodec {
    type Item = Frame;
    type Error = LinesCodecError;

    fn decode(&mut self, buf: &mut BytesMut) -> Result<Option<Frame>, LinesCodecError> {
        lift(self.lines.decode(buf))
    }

    fn decode_eof(&mut self, buf: &mut BytesMut) -> Result<Option<Frame>, LinesCodecError> {
        lift(self.lines.decode_eof(buf))
    }
}

impl Encoder<String> for ChatCodec {
    type Error = LinesCodecError;

    fn encode(&mut self, line: String, buf: &mut BytesMut) -> Result<(), LinesCodecError> {
        self.lines.encode(line, buf)
    }
}

/// Sending half of a connection
///
/// Cheap to clone; every clone feeds the same writer task. A queue that
/// overflows once is done: later sends fail and `closed` resolves, so the
/// peer is dropped instead of receiving a feed with gaps.
#[derive(Debug, Clone)]
pub struct Outbound {
    sender: mpsc::Sender<Message>,
    overflowed: CancellationToken,
}

impl Outbound {
    /// Spawn the writer task for `writer` and return its queue handle
    ///
    /// The task ends once every `Outbound` clone is dropped (after draining
    /// what was queued) or as soon as a write fails.
    pub fn spawn<W>(writer: W) -> (Self, JoinHandle<()>)
    where
        W: AsyncWrite + Unpin + Send + 'static,
    {
        let (sender, receiver) = mpsc::channel(OUTBOUND_BUFFER_SIZE);
        let task = tokio::spawn(write_loop(
            FramedWrite::new(writer, ChatCodec::new()),
            receiver,
        ));
        (Self::from_sender(sender), task)
    }

    fn from_sender(sender: mpsc::Sender<Message>) -> Self {
        Self {
            sender,
            overflowed: CancellationToken::new(),
        }
    }

    /// Queue handle backed by a plain channel instead of a socket
    #[cfg(test)]
    pub(crate) fn detached(capacity: usize) -> (Self, mpsc::Receiver<Message>) {
        let (sender, receiver) = mpsc::channel(capacity);
        (Self::from_sender(sender), receiver)
    }

    /// Queue a message without waiting
    ///
    /// Fails if the writer is gone (peer disconnected) or the queue is, or
    /// has ever been, full.
    pub fn send(&self, msg: Message) -> Result<(), SendError> {
        if self.overflowed.is_cancelled() {
            return Err(SendError::Full);
        }
        self.sender.try_send(msg).map_err(|e| match e {
            TrySendError::Full(_) => {
                self.overflowed.cancel();
                SendError::Full
            }
            TrySendError::Closed(_) => SendError::ChannelClosed,
        })
    }

    /// Resolves once the writer task has stopped accepting messages or the
    /// queue has overflowed
    pub async fn closed(&self) {
        tokio::select! {
            _ = self.sender.closed() => {}
            _ = self.overflowed.cancelled() => {}
        }
    }
}

async fn write_loop<W>(mut sink: FramedWrite<W, ChatCodec>, mut receiver: mpsc::Receiver<Message>)
where
    W: AsyncWrite + Unpin,
{
    while let Some(msg) = receiver.recv().await {
        if let Err(e) = sink.send(msg.encode()).await {
            debug!("Write failed, ending writer task: {}", e);
            break;
        }
    }
    let _ = sink.close().await;
    debug!("Writer task ended");
}

/// Receiving half of a connection
pub struct Inbound<R> {
    frames: FramedRead<R, ChatCodec>,
}

impl<R> Inbound<R>
where
    R: AsyncRead + Unpin,
{
    pub fn new(reader: R) -> Self {
        Self {
            frames: FramedRead::new(reader, ChatCodec::new()),
        }
    }

    /// Wait for the next complete frame
    ///
    /// End of stream maps to `AppError::ChannelClosed`. An over-long frame
    /// maps to `AppError::FrameTooLong`; the stream stays usable afterwards.
    pub async fn receive(&mut self) -> Result<String, AppError> {
        match self.frames.next().await {
            Some(Ok(Frame::Line(line))) => Ok(line),
            Some(Ok(Frame::TooLong)) => Err(AppError::FrameTooLong),
            Some(Err(e)) => Err(e.into()),
            None => Err(AppError::ChannelClosed),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};

    use super::*;

    #[tokio::test]
    async fn test_outbound_writes_lines_in_order() {
        let (client, server) = tokio::io::duplex(4096);
        let (outbound, writer) = Outbound::spawn(server);

        outbound.send(Message::system("first")).unwrap();
        outbound.send(Message::error("second")).unwrap();
        drop(outbound);
        writer.await.unwrap();

        let mut lines = BufReader::new(client).lines();
        assert_eq!(lines.next_line().await.unwrap().as_deref(), Some("first"));
        assert_eq!(lines.next_line().await.unwrap().as_deref(), Some("Error: second"));
        assert_eq!(lines.next_line().await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_send_after_writer_gone() {
        let (outbound, receiver) = Outbound::detached(1);
        drop(receiver);
        assert_eq!(
            outbound.send(Message::system("lost")),
            Err(SendError::ChannelClosed)
        );
    }

    #[tokio::test]
    async fn test_send_to_full_queue() {
        let (outbound, _receiver) = Outbound::detached(1);
        outbound.send(Message::system("one")).unwrap();
        assert_eq!(outbound.send(Message::system("two")), Err(SendError::Full));
    }

    #[tokio::test]
    async fn test_overflow_closes_queue_for_good() {
        let (outbound, mut receiver) = Outbound::detached(1);
        let other = outbound.clone();
        outbound.send(Message::system("one")).unwrap();
        assert_eq!(outbound.send(Message::system("two")), Err(SendError::Full));

        // Every clone observes the overflow
        tokio::time::timeout(Duration::from_secs(1), other.closed())
            .await
            .expect("closed after overflow");

        // Room in the queue again, but the gap must not be papered over
        assert_eq!(receiver.recv().await.unwrap().content, "one");
        assert_eq!(other.send(Message::system("three")), Err(SendError::Full));
        assert!(receiver.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_inbound_splits_coalesced_frames() {
        let (mut client, server) = tokio::io::duplex(4096);
        let mut inbound = Inbound::new(server);

        client.write_all(b"hello\r\nworld\n").await.unwrap();
        assert_eq!(inbound.receive().await.unwrap(), "hello");
        assert_eq!(inbound.receive().await.unwrap(), "world");

        drop(client);
        assert!(matches!(inbound.receive().await, Err(AppError::ChannelClosed)));
    }

    #[tokio::test]
    async fn test_inbound_rejects_long_frame_and_recovers() {
        let (mut client, server) = tokio::io::duplex(8192);
        let mut inbound = Inbound::new(server);

        // The follow-up line arrives in the same burst as the long one
        let long = "x".repeat(MAX_FRAME_LEN + 10);
        client.write_all(long.as_bytes()).await.unwrap();
        client.write_all(b"\nshort\n").await.unwrap();

        assert!(matches!(inbound.receive().await, Err(AppError::FrameTooLong)));
        assert_eq!(inbound.receive().await.unwrap(), "short");
    }

    #[test]
    fn test_codec_decodes_partial_input() {
        let mut codec = ChatCodec::new();
        let mut buf = BytesMut::from(&b"hel"[..]);
        assert_eq!(codec.decode(&mut buf).unwrap(), None);

        buf.extend_from_slice(b"lo\n");
        assert_eq!(
            codec.decode(&mut buf).unwrap(),
            Some(Frame::Line("hello".to_string()))
        );

        buf.extend_from_slice(b"tail");
        assert_eq!(
            codec.decode_eof(&mut buf).unwrap(),
            Some(Frame::Line("tail".to_string()))
        );
    }
}
