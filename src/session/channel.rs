use std::fmt;
use std::io;
use std::net::Ipv4Addr;
use std::os::unix::io::OwnedFd;
use std::os::unix::net::UnixDatagram as StdUnixDatagram;

use bytes::BytesMut;
use log::trace;
use socket2::{Domain, SockAddr, Socket, Type};
use tokio::net::UnixDatagram;
use tokio_util::codec::{Decoder, Encoder};

use super::codec::{MessageCodec, MessageError};
use super::{Received, SessionError};
use crate::models::Message;

/// Message channel to one neighbor.
///
/// Backed by a connected AF_UNIX SOCK_SEQPACKET socket, so every datagram is
/// exactly one message. The socket path is the neighbor's address.
pub struct Channel {
    neighbor: Ipv4Addr,
    socket: UnixDatagram,
    max_message_size: usize,
}

impl Channel {
    /// Connect to the socket named after `neighbor`
    pub fn connect(neighbor: Ipv4Addr, max_message_size: usize) -> io::Result<Self> {
        let socket = Socket::new(Domain::UNIX, Type::SEQPACKET, None)?;
        socket.connect(&SockAddr::unix(neighbor.to_string())?)?;
        Self::from_socket(neighbor, socket, max_message_size)
    }

    /// Wrap an already connected socket. Must be called within a tokio runtime.
    pub fn from_socket(
        neighbor: Ipv4Addr,
        socket: Socket,
        max_message_size: usize,
    ) -> io::Result<Self> {
        socket.set_nonblocking(true)?;
        let socket = StdUnixDatagram::from(OwnedFd::from(socket));
        Ok(Self {
            neighbor,
            socket: UnixDatagram::from_std(socket)?,
            max_message_size,
        })
    }

    pub fn neighbor(&self) -> Ipv4Addr {
        self.neighbor
    }

    /// Wait for the next message from the neighbor
    pub async fn recv(&self) -> Result<Received, SessionError> {
        let mut buf = vec![0u8; self.max_message_size];
        let len = self.socket.recv(&mut buf).await?;
        if len == 0 {
            return Ok(Received::Closed);
        }
        trace!("Read {} bytes from {}", len, self.neighbor);
        let mut data = BytesMut::from(&buf[..len]);
        match MessageCodec::new().decode(&mut data) {
            Ok(Some(message)) => Ok(Received::Message(message)),
            Ok(None) => Ok(Received::Closed),
            Err(MessageError::Malformed(src, reason)) => Ok(Received::Malformed { src, reason }),
            Err(err) => Err(err.into()),
        }
    }

    pub async fn send(&self, message: Message) -> Result<(), SessionError> {
        let mut buf = BytesMut::with_capacity(256);
        MessageCodec::new().encode(message, &mut buf)?;
        self.socket.send(&buf).await?;
        trace!("Wrote {} bytes to {}", buf.len(), self.neighbor);
        Ok(())
    }
}

impl fmt::Display for Channel {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "<Channel {}>", self.neighbor)
    }
}
