//! Decoding of json-seq response bodies.

use std::marker::PhantomData;
use std::pin::Pin;
use std::task::{Context, Poll, ready};

use bytes::Bytes;
use futures::Stream;
use http_body::Body;
use pathrpc_core::json_seq::{Frame, FrameDecoder};
use serde::de::DeserializeOwned;

use crate::error::ClientError;

/// One item of a json-seq response.
#[derive(Clone, Debug, PartialEq)]
pub enum SeqItem<T> {
    Next(T),
    /// The trailing pagination frame. Links are relative to the server.
    Links {
        prev: Option<String>,
        next: Option<String>,
    },
}

pin_project_lite::pin_project! {
    /// Stream adapter decoding json-seq frames from a response body.
    ///
    /// Frames are decoded as the body is read, so items are available
    /// before the response completes. An `$error` frame is yielded as
    /// [`ClientError::Status`] and ends the stream.
    pub struct SeqStream<B, T> {
        #[pin]
        body: B,
        decoder: FrameDecoder,
        body_done: bool,
        finished: bool,
        _marker: PhantomData<fn() -> T>,
    }
}

impl<B, T> SeqStream<B, T> {
    pub fn new(body: B) -> Self {
        Self {
            body,
            decoder: FrameDecoder::new(),
            body_done: false,
            finished: false,
            _marker: PhantomData,
        }
    }

    pub fn is_finished(&self) -> bool {
        self.finished
    }
}

fn convert<T: DeserializeOwned>(frame: Frame) -> Result<SeqItem<T>, ClientError> {
    match frame {
        Frame::Value(value) => serde_json::from_value(value)
            .map(SeqItem::Next)
            .map_err(|err| ClientError::Decode(format!("JSON decoding failed: {err}"))),
        Frame::Links { prev, next } => Ok(SeqItem::Links { prev, next }),
        Frame::Error(error) => {
            let status = error
                .get("status")
                .and_then(|status| status.as_u64())
                .and_then(|status| u16::try_from(status).ok())
                .and_then(|status| http::StatusCode::from_u16(status).ok())
                .unwrap_or(http::StatusCode::INTERNAL_SERVER_ERROR);
            Err(ClientError::from_body(status, Some(error)))
        }
    }
}

impl<B, T> Stream for SeqStream<B, T>
where
    B: Body<Data = Bytes>,
    B::Error: std::fmt::Display,
    T: DeserializeOwned,
{
    type Item = Result<SeqItem<T>, ClientError>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let mut this = self.project();
        loop {
            if *this.finished {
                return Poll::Ready(None);
            }

            let frame = if *this.body_done {
                this.decoder.finish()
            } else {
                this.decoder.next_frame()
            };
            match frame {
                Ok(Some(frame)) => {
                    let item = convert(frame);
                    if matches!(item, Err(_) | Ok(SeqItem::Links { .. })) {
                        *this.finished = true;
                    }
                    return Poll::Ready(Some(item));
                }
                Ok(None) if *this.body_done => {
                    *this.finished = true;
                    return Poll::Ready(None);
                }
                Ok(None) => {}
                Err(err) => {
                    *this.finished = true;
                    return Poll::Ready(Some(Err(err.into())));
                }
            }

            match ready!(this.body.as_mut().poll_frame(cx)) {
                Some(Ok(frame)) => {
                    if let Ok(data) = frame.into_data() {
                        this.decoder.push(&data);
                    }
                }
                Some(Err(err)) => {
                    *this.finished = true;
                    return Poll::Ready(Some(Err(ClientError::Transport(format!(
                        "failed to read response body: {err}"
                    )))));
                }
                None => *this.body_done = true,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::StreamExt;
    use http_body_util::{BodyExt, Full, StreamBody};
    use serde_json::json;

    fn chunked(chunks: Vec<&'static [u8]>) -> impl Body<Data = Bytes, Error = std::convert::Infallible> {
        let frames = chunks
            .into_iter()
            .map(|chunk| Ok::<_, std::convert::Infallible>(http_body::Frame::data(Bytes::from_static(chunk))));
        StreamBody::new(futures::stream::iter(frames))
    }

    #[tokio::test]
    async fn test_items_and_links_across_chunks() {
        let body = chunked(vec![b"\x1e1\n\x1e", b"2\n", b"\x1e{\"$prev\":null,\"$next\":\"/n?page=2\"}\n"]);
        let items: Vec<_> = SeqStream::<_, u32>::new(body).collect().await;
        assert_eq!(items.len(), 3);
        assert_eq!(items[0].as_ref().unwrap(), &SeqItem::Next(1));
        assert_eq!(items[1].as_ref().unwrap(), &SeqItem::Next(2));
        assert_eq!(
            items[2].as_ref().unwrap(),
            &SeqItem::Links {
                prev: None,
                next: Some("/n?page=2".into())
            }
        );
    }

    #[tokio::test]
    async fn test_error_frame_ends_stream() {
        let body = Full::new(Bytes::from_static(
            b"\x1e1\n\x1e{\"$error\":{\"status\":400,\"message\":\"bad\"}}\n\x1e2\n",
        ));
        let items: Vec<_> = SeqStream::<_, u32>::new(body).collect().await;
        assert_eq!(items.len(), 2);
        let err = items[1].as_ref().unwrap_err();
        assert_eq!(err.status(), Some(http::StatusCode::BAD_REQUEST));
        assert_eq!(err.message(), Some("bad"));
        assert_eq!(err.body(), Some(&json!({ "status": 400, "message": "bad" })));
    }

    #[tokio::test]
    async fn test_unterminated_last_frame() {
        let body = Full::new(Bytes::from_static(b"\x1e1\n\x1e2")).boxed();
        let items: Vec<u32> = SeqStream::<_, u32>::new(body)
            .map(|item| match item.unwrap() {
                SeqItem::Next(n) => n,
                SeqItem::Links { .. } => panic!("unexpected links"),
            })
            .collect()
            .await;
        assert_eq!(items, [1, 2]);
    }

    #[tokio::test]
    async fn test_garbage_is_protocol_error() {
        let body = Full::new(Bytes::from_static(b"not json-seq"));
        let items: Vec<_> = SeqStream::<_, u32>::new(body).collect().await;
        assert!(matches!(items[0], Err(ClientError::Protocol(_))));
        assert_eq!(items.len(), 1);
    }
}
