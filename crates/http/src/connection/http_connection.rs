use std::sync::Arc;
use std::sync::atomic::Ordering;

use futures::{SinkExt, StreamExt};
use http::{Method, StatusCode};
use tokio::io::{AsyncRead, AsyncWrite, AsyncWriteExt};
use tokio::sync::{mpsc, oneshot};
use tokio_util::codec::{FramedRead, FramedWrite};
use tracing::{debug, error, info};

use crate::codec::{RequestDecoder, ResponseEncoder};
use crate::connection::{Outgoing, ResponseSink};
use crate::handler::Lifecycle;
use crate::protocol::{HttpError, Message, ParseError, PayloadItem, PayloadSize, RequestHeader, ResponseHead, SendError};

const DEFAULT_CHANNEL_CAPACITY: usize = 16;

type RequestMessage = Message<(RequestHeader, PayloadSize)>;
type ResponseMessage = Message<(ResponseHead, PayloadSize)>;

/// Serves the requests of one connection.
///
/// Requests are processed one at a time. After a request is finished the connection
/// waits until its response has been flushed before reading the next one, so a
/// request that nobody answers keeps the connection open until the peer goes away.
pub struct HttpConnection<R, W> {
    framed_read: FramedRead<R, RequestDecoder>,
    writer: W,
    channel_capacity: usize,
}

impl<R, W> HttpConnection<R, W>
where
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin + Send + 'static,
{
    pub fn new(reader: R, writer: W) -> Self {
        Self {
            framed_read: FramedRead::with_capacity(reader, RequestDecoder::new(), 8 * 1024),
            writer,
            channel_capacity: DEFAULT_CHANNEL_CAPACITY,
        }
    }

    /// Number of response frames that may be queued before a [`ResponseSink`] blocks.
    pub fn channel_capacity(mut self, channel_capacity: usize) -> Self {
        self.channel_capacity = channel_capacity.max(1);
        self
    }

    pub async fn process<L: Lifecycle>(self, lifecycle: Arc<L>) -> Result<(), HttpError> {
        let (sender, receiver) = mpsc::channel(self.channel_capacity);
        let write_task = tokio::spawn(write_loop(FramedWrite::new(self.writer, ResponseEncoder::new()), receiver));

        let mut session = Session { framed_read: self.framed_read, pending: None, sender, lifecycle };
        let result = session.run().await;

        // closing the channel lets the writer drain what is queued and shut down
        drop(session);
        if let Err(e) = write_task.await {
            error!(cause = %e, "response writer task failed");
        }
        result
    }
}

struct Session<R, L> {
    framed_read: FramedRead<R, RequestDecoder>,
    /// a pipelined message read while waiting for the previous response
    pending: Option<Result<RequestMessage, ParseError>>,
    sender: mpsc::Sender<Outgoing>,
    lifecycle: Arc<L>,
}

impl<R, L> Session<R, L>
where
    R: AsyncRead + Unpin,
    L: Lifecycle,
{
    async fn run(&mut self) -> Result<(), HttpError> {
        loop {
            let message = match self.pending.take() {
                Some(message) => Some(message),
                None => self.framed_read.next().await,
            };

            let header = match message {
                Some(Ok(Message::Header((header, _)))) => header,

                Some(Ok(Message::Payload(_))) => {
                    error!("receive request body while expecting a request header");
                    self.send_error(StatusCode::BAD_REQUEST).await;
                    return Err(ParseError::invalid_body("need header while receive body").into());
                }

                Some(Err(e)) => {
                    error!(cause = %e, "can't receive next request");
                    self.send_error(StatusCode::BAD_REQUEST).await;
                    return Err(e.into());
                }

                None => {
                    info!("cant read more request, break this connection down");
                    return Ok(());
                }
            };

            if !self.process_request(header).await? {
                return Ok(());
            }
        }
    }

    /// Drives one request through the lifecycle; returns whether to keep the connection.
    async fn process_request(&mut self, header: RequestHeader) -> Result<bool, HttpError> {
        let keep_alive = header.is_keep_alive();
        let head_only = header.method() == Method::HEAD;
        let version = header.version();

        if header.expects_continue() {
            self.sender.send(Outgoing::Continue).await.map_err(|_| SendError::Closed)?;
            info!("receive expect request header, sent continue response");
        }

        let (flushed_tx, mut flushed_rx) = oneshot::channel();
        let sink = ResponseSink::new(self.sender.clone(), flushed_tx, head_only, version);
        let close_after = sink.close_after();
        let mut ctx = self.blocking(move |lifecycle| lifecycle.on_headers(header, sink)).await?;

        loop {
            match self.framed_read.next().await {
                Some(Ok(Message::Payload(PayloadItem::Chunk(chunk)))) => {
                    ctx = self
                        .blocking(move |lifecycle| {
                            lifecycle.on_body_chunk(&mut ctx, chunk);
                            ctx
                        })
                        .await?;
                }

                Some(Ok(Message::Payload(PayloadItem::Eof))) => break,

                Some(Ok(Message::Header(_))) => {
                    self.cleanup(ctx).await?;
                    return Err(ParseError::invalid_body("receive request header while reading body").into());
                }

                Some(Err(e)) => {
                    error!(cause = %e, "failed to read request body");
                    self.cleanup(ctx).await?;
                    return Err(e.into());
                }

                None => {
                    info!("connection closed while reading request body");
                    self.cleanup(ctx).await?;
                    return Ok(false);
                }
            }
        }

        ctx = self
            .blocking(move |lifecycle| {
                lifecycle.on_finished(&mut ctx);
                ctx
            })
            .await?;

        loop {
            tokio::select! {
                biased;

                _ = &mut flushed_rx => break,

                next = self.framed_read.next(), if self.pending.is_none() => match next {
                    Some(message) => self.pending = Some(message),
                    None => {
                        debug!("peer closed the connection before the response was flushed");
                        self.cleanup(ctx).await?;
                        return Ok(false);
                    }
                },
            }
        }

        self.cleanup(ctx).await?;
        if close_after.load(Ordering::Acquire) {
            debug!("response body is delimited by connection close");
            return Ok(false);
        }
        Ok(keep_alive)
    }

    async fn cleanup(&self, ctx: L::Context) -> Result<(), HttpError> {
        self.blocking(move |lifecycle| lifecycle.on_cleanup(ctx)).await
    }

    /// Runs a lifecycle callback on the blocking pool.
    async fn blocking<T, F>(&self, f: F) -> Result<T, HttpError>
    where
        F: FnOnce(&L) -> T + Send + 'static,
        T: Send + 'static,
    {
        let lifecycle = Arc::clone(&self.lifecycle);
        Ok(tokio::task::spawn_blocking(move || f(&lifecycle)).await?)
    }

    async fn send_error(&self, status: StatusCode) {
        let mut head = ResponseHead::new(());
        *head.status_mut() = status;

        let (flushed_tx, flushed_rx) = oneshot::channel();
        let frames = [
            Outgoing::Message(Message::Header((head, PayloadSize::Empty))),
            Outgoing::Message(Message::Payload(PayloadItem::Eof)),
            Outgoing::Flush(flushed_tx),
        ];
        for frame in frames {
            if self.sender.send(frame).await.is_err() {
                return;
            }
        }
        let _ = flushed_rx.await;
    }
}

async fn write_loop<W>(mut framed_write: FramedWrite<W, ResponseEncoder>, mut receiver: mpsc::Receiver<Outgoing>)
where
    W: AsyncWrite + Unpin,
{
    while let Some(outgoing) = receiver.recv().await {
        let result = match outgoing {
            Outgoing::Continue => write_continue(framed_write.get_mut()).await,
            Outgoing::Message(message) => framed_write.feed(message).await,
            Outgoing::Flush(flushed) => {
                let result = SinkExt::<ResponseMessage>::flush(&mut framed_write).await;
                let _ = flushed.send(());
                result
            }
        };

        if let Err(e) = result {
            error!(cause = %e, "failed to write response, stop writing");
            return;
        }
    }

    if let Err(e) = SinkExt::<ResponseMessage>::close(&mut framed_write).await {
        debug!(cause = %e, "failed to shutdown connection");
    }
}

async fn write_continue<W: AsyncWrite + Unpin>(writer: &mut W) -> Result<(), SendError> {
    writer.write_all(b"HTTP/1.1 100 Continue\r\n\r\n").await?;
    writer.flush().await?;
    Ok(())
}
