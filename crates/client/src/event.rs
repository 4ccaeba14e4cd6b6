//! Typed events decoded from a processing response.

use futures::stream::{self, BoxStream, StreamExt};
use std::collections::VecDeque;

use m4k_core::StatusPayload;

use crate::error::ClientError;
use crate::multipart::{Part, PartParser};

/// One item of a processing response. Keepalives are not reported.
#[derive(Debug, Clone, PartialEq)]
pub enum ClientEvent {
    /// Queue position, progress or the final processing error.
    Status(StatusPayload),
    File(ReceivedFile),
}

/// A produced file, fully received.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReceivedFile {
    pub name: String,
    pub mime_type: String,
    pub data: Vec<u8>,
}

impl ClientEvent {
    /// Decodes a part; `None` for keepalives.
    pub fn from_part(part: Part) -> Result<Option<Self>, ClientError> {
        match part.content_type() {
            Some("application/json") => {
                let status = serde_json::from_slice(&part.body)?;
                Ok(Some(Self::Status(status)))
            }
            Some("text/plain") => Ok(None),
            _ => {
                let name = part
                    .filename()
                    .ok_or_else(|| ClientError::malformed("file part without a filename"))?;
                let mime_type = part
                    .content_type()
                    .unwrap_or("application/octet-stream")
                    .to_string();
                Ok(Some(Self::File(ReceivedFile {
                    name,
                    mime_type,
                    data: part.body,
                })))
            }
        }
    }
}

/// Events of one response, in wire order.
pub type EventStream = BoxStream<'static, Result<ClientEvent, ClientError>>;

struct Relay<B> {
    chunks: BoxStream<'static, Result<B, ClientError>>,
    parser: PartParser,
    ready: VecDeque<Part>,
}

impl<B: AsRef<[u8]> + Send + 'static> Relay<B> {
    async fn next(mut self) -> Result<Option<(ClientEvent, Self)>, ClientError> {
        loop {
            while let Some(part) = self.ready.pop_front() {
                if let Some(event) = ClientEvent::from_part(part)? {
                    return Ok(Some((event, self)));
                }
            }
            if self.parser.is_done() {
                return Ok(None);
            }
            match self.chunks.next().await {
                Some(chunk) => {
                    let parts = self.parser.feed(chunk?.as_ref())?;
                    self.ready.extend(parts);
                }
                None => {
                    self.parser.finish()?;
                    return Ok(None);
                }
            }
        }
    }
}

/// Decodes a chunked multipart body into events as the chunks arrive.
pub fn decode_events<B>(
    chunks: BoxStream<'static, Result<B, ClientError>>,
    boundary: &str,
) -> EventStream
where
    B: AsRef<[u8]> + Send + 'static,
{
    let relay = Relay {
        chunks,
        parser: PartParser::new(boundary),
        ready: VecDeque::new(),
    };
    stream::try_unfold(relay, Relay::next).boxed()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn chunks(body: &'static str, size: usize) -> BoxStream<'static, Result<Vec<u8>, ClientError>> {
        let chunks: Vec<_> = body
            .as_bytes()
            .chunks(size)
            .map(|c| Ok(c.to_vec()))
            .collect();
        stream::iter(chunks).boxed()
    }

    const BODY: &str = "--B\r\nContent-Type: application/json\r\n\r\n{\"position\":1}\
                        \r\n--B\r\nContent-Type: text/plain\r\n\r\nkeepalive\
                        \r\n--B\r\nContent-Type: application/json\r\n\r\n{\"progress\":100}\
                        \r\n--B\r\nContent-Disposition: attachment; filename=\"out.ogg\"\r\n\
                        Content-Type: audio/ogg\r\n\r\nOggS\
                        \r\n--B--\r\n";

    #[test]
    fn test_decode_skips_keepalives() {
        let events: Vec<_> = futures::executor::block_on(
            decode_events(chunks(BODY, 7), "B").collect::<Vec<_>>(),
        )
        .into_iter()
        .map(Result::unwrap)
        .collect();

        assert_eq!(
            events,
            vec![
                ClientEvent::Status(StatusPayload::Position { position: 1 }),
                ClientEvent::Status(StatusPayload::Progress { progress: 100 }),
                ClientEvent::File(ReceivedFile {
                    name: "out.ogg".to_string(),
                    mime_type: "audio/ogg".to_string(),
                    data: b"OggS".to_vec(),
                }),
            ]
        );
    }

    #[test]
    fn test_decode_error_payload() {
        let body = "--B\r\nContent-Type: application/json\r\n\r\n{\"error\":\"boom\"}\r\n--B--\r\n";
        let events: Vec<_> =
            futures::executor::block_on(decode_events(chunks(body, 64), "B").collect::<Vec<_>>());
        assert_eq!(events.len(), 1);
        assert_eq!(
            *events[0].as_ref().unwrap(),
            ClientEvent::Status(StatusPayload::Error {
                error: "boom".to_string()
            })
        );
    }

    #[test]
    fn test_truncated_stream_ends_with_error() {
        let body = "--B\r\nContent-Type: application/json\r\n\r\n{\"position\":0}\r\n--B\r\nContent-Ty";
        let events: Vec<_> =
            futures::executor::block_on(decode_events(chunks(body, 5), "B").collect::<Vec<_>>());
        assert_eq!(events.len(), 2);
        assert!(events[0].is_ok());
        assert!(matches!(events[1], Err(ClientError::Malformed(_))));
    }
}
