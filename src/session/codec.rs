use std::fmt;
use std::io;
use std::net::Ipv4Addr;

use bytes::{BufMut, BytesMut};
use serde::Deserialize;
use tokio_util::codec::{Decoder, Encoder};

use crate::models::Message;

/// JSON codec for neighbor channels.
/// The transport preserves message boundaries, so a buffer handed to
/// `decode` holds exactly one message.
#[derive(Debug, Default)]
pub struct MessageCodec;

impl MessageCodec {
    pub fn new() -> Self {
        Self
    }
}

#[derive(Debug)]
pub enum MessageError {
    /// Could not be understood. [sender if it could be recovered, reason]
    Malformed(Option<Ipv4Addr>, String),
    /// Something happened in transport. [reason]
    Io(io::Error),
}

impl fmt::Display for MessageError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            MessageError::Malformed(Some(src), reason) => {
                write!(f, "Malformed message from {}: {}", src, reason)
            }
            MessageError::Malformed(None, reason) => write!(f, "Malformed message: {}", reason),
            MessageError::Io(err) => write!(f, "Message I/O error: {}", err),
        }
    }
}

impl std::error::Error for MessageError {}

impl From<io::Error> for MessageError {
    fn from(error: io::Error) -> Self {
        MessageError::Io(error)
    }
}

/// Just enough of a message to know who to complain to
#[derive(Deserialize)]
struct Sender {
    src: Option<Ipv4Addr>,
}

impl Decoder for MessageCodec {
    type Item = Message;
    type Error = MessageError;

    fn decode(&mut self, buf: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        if buf.is_empty() {
            return Ok(None);
        }
        let data = buf.split_to(buf.len());
        match serde_json::from_slice::<Message>(&data) {
            Ok(message) => Ok(Some(message)),
            Err(err) => {
                let src = serde_json::from_slice::<Sender>(&data)
                    .ok()
                    .and_then(|sender| sender.src);
                Err(MessageError::Malformed(src, err.to_string()))
            }
        }
    }
}

impl Encoder<Message> for MessageCodec {
    type Error = MessageError;

    fn encode(&mut self, message: Message, buf: &mut BytesMut) -> Result<(), Self::Error> {
        serde_json::to_writer(buf.writer(), &message)
            .map_err(|err| MessageError::Io(io::Error::new(io::ErrorKind::InvalidData, err)))
    }
}
