//! Streaming request bodies
//!
//! Single-request uploads hand the SDK a body that is filled from the
//! source reader while the request is sent, so bytes are read from the
//! source (and counted by any progress observer) at the pace of the upload.

use std::pin::Pin;
use std::task::{Context, Poll};

use aws_sdk_s3::primitives::ByteStream;
use bytes::Bytes;
use futures::StreamExt;
use http_body::{Body, Frame, SizeHint};
use tokio::sync::mpsc;
use tokio_util::io::ReaderStream;

use s3ctl_core::ObjectReader;

/// Bytes read from the source per chunk
const CHUNK_SIZE: usize = 64 * 1024;

/// Chunks read ahead of the network
const READ_AHEAD: usize = 1;

/// Request body fed by a background reader task
pub(crate) struct ChannelBody {
    chunks: mpsc::Receiver<std::io::Result<Bytes>>,
    size: u64,
}

impl ChannelBody {
    /// Start reading `reader` into a body of exactly `size` bytes
    pub(crate) fn spawn(reader: ObjectReader, size: u64) -> Self {
        let (tx, rx) = mpsc::channel(READ_AHEAD);
        tokio::spawn(async move {
            let mut chunks = ReaderStream::with_capacity(reader, CHUNK_SIZE);
            while let Some(chunk) = chunks.next().await {
                let failed = chunk.is_err();
                // Receiver gone: the request was dropped or failed
                if tx.send(chunk).await.is_err() || failed {
                    break;
                }
            }
        });

        Self { chunks: rx, size }
    }

    pub(crate) fn into_byte_stream(self) -> ByteStream {
        ByteStream::from_body_1_x(self)
    }
}

impl Body for ChannelBody {
    type Data = Bytes;
    type Error = std::io::Error;

    fn poll_frame(
        mut self: Pin<&mut Self>,
        cx: &mut Context<'_>,
    ) -> Poll<Option<std::result::Result<Frame<Bytes>, Self::Error>>> {
        self.chunks
            .poll_recv(cx)
            .map(|chunk| chunk.map(|chunk| chunk.map(Frame::data)))
    }

    fn size_hint(&self) -> SizeHint {
        SizeHint::with_exact(self.size)
    }
}
