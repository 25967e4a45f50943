mod channel;
pub mod codec;
mod message_counts;

use std::collections::BTreeMap;
use std::error;
use std::fmt;
use std::io;
use std::net::Ipv4Addr;
use std::sync::Arc;

use futures::stream::{self, BoxStream, SelectAll, StreamExt};
use log::{debug, info};

pub use channel::Channel;
use codec::MessageError;
pub use message_counts::MessageCounts;

use crate::config::RouterConfig;
use crate::models::Message;
use crate::router::Outbound;

/// What a neighbor channel produced on one read
#[derive(Debug)]
pub enum Received {
    Message(Message),
    /// Datagram that isn't a valid message, with the sender if one could be read
    Malformed {
        src: Option<Ipv4Addr>,
        reason: String,
    },
    /// Neighbor closed the channel
    Closed,
}

#[derive(Debug)]
pub enum SessionError {
    /// Couldn't open the channel to a neighbor. [neighbor, reason]
    Connect(Ipv4Addr, String),
    /// Tried to send to a neighbor with no channel. [neighbor]
    UnknownNeighbor(Ipv4Addr),
    /// Something happened in transport. [reason]
    TransportError(String),
}

impl fmt::Display for SessionError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str("Session Error: ")?;
        use SessionError::*;
        match self {
            Connect(neighbor, r) => write!(f, "Could not connect to {} [{}]", neighbor, r)?,
            UnknownNeighbor(neighbor) => write!(f, "No channel to {}", neighbor)?,
            TransportError(r) => write!(f, "Transport error [{}]", r)?,
        }
        Ok(())
    }
}

impl From<io::Error> for SessionError {
    fn from(error: io::Error) -> Self {
        SessionError::TransportError(error.to_string())
    }
}

impl From<MessageError> for SessionError {
    fn from(error: MessageError) -> Self {
        SessionError::TransportError(error.to_string())
    }
}

impl error::Error for SessionError {}

/// Merged stream of everything read from all neighbor channels
pub type Inbound = SelectAll<BoxStream<'static, (Ipv4Addr, Result<Received, SessionError>)>>;

/// Open channels to every configured neighbor
pub struct Sessions {
    channels: BTreeMap<Ipv4Addr, Arc<Channel>>,
    counts: BTreeMap<Ipv4Addr, MessageCounts>,
}

impl Sessions {
    /// Connect to all neighbors in `config`, failing if any can't be reached
    pub fn connect(config: &RouterConfig) -> Result<Self, SessionError> {
        let mut channels = Vec::with_capacity(config.neighbors.len());
        for neighbor in &config.neighbors {
            let channel = Channel::connect(neighbor.addr, config.max_message_size)
                .map_err(|err| SessionError::Connect(neighbor.addr, err.to_string()))?;
            info!("Connected to neighbor {}", neighbor);
            channels.push(channel);
        }
        Ok(Self::from_channels(channels))
    }

    pub fn from_channels(channels: Vec<Channel>) -> Self {
        let channels: BTreeMap<_, _> = channels
            .into_iter()
            .map(|channel| (channel.neighbor(), Arc::new(channel)))
            .collect();
        let counts = channels
            .keys()
            .map(|neighbor| (*neighbor, MessageCounts::new()))
            .collect();
        Self { channels, counts }
    }

    /// Stream of reads from all channels. A channel's stream ends after
    /// it reports closure or a transport error.
    pub fn inbound(&self) -> Inbound {
        stream::select_all(
            self.channels
                .values()
                .map(|channel| receive(Arc::clone(channel)).boxed()),
        )
    }

    pub async fn send(&mut self, outbound: Outbound) -> Result<(), SessionError> {
        let channel = self
            .channels
            .get(&outbound.to)
            .ok_or(SessionError::UnknownNeighbor(outbound.to))?;
        debug!("Sending {}", outbound);
        channel.send(outbound.message).await?;
        if let Some(counts) = self.counts.get_mut(&outbound.to) {
            counts.increment_sent();
        }
        Ok(())
    }

    /// Record a read from `neighbor`
    pub fn mark_received(&mut self, neighbor: Ipv4Addr, malformed: bool) {
        if let Some(counts) = self.counts.get_mut(&neighbor) {
            counts.increment_received();
            if malformed {
                counts.increment_malformed();
            }
        }
    }

    pub fn counts(&self) -> impl Iterator<Item = (Ipv4Addr, &MessageCounts)> {
        self.counts.iter().map(|(neighbor, counts)| (*neighbor, counts))
    }
}

fn receive(
    channel: Arc<Channel>,
) -> impl futures::Stream<Item = (Ipv4Addr, Result<Received, SessionError>)> {
    stream::unfold(Some(channel), |channel| async move {
        let channel = match channel {
            Some(channel) => channel,
            None => return None,
        };
        let result = channel.recv().await;
        let next = match result {
            Ok(Received::Message(_)) | Ok(Received::Malformed { .. }) => Some(Arc::clone(&channel)),
            _ => None,
        };
        Some(((channel.neighbor(), result), next))
    })
}
