use std::fmt;

/// Messages exchanged with one neighbor over the router's lifetime
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct MessageCounts {
    received: u64,
    malformed: u64,
    sent: u64,
}

impl MessageCounts {
    pub fn new() -> Self {
        MessageCounts::default()
    }

    pub fn received(&self) -> u64 {
        self.received
    }
    pub fn increment_received(&mut self) {
        self.received += 1;
    }

    pub fn malformed(&self) -> u64 {
        self.malformed
    }
    pub fn increment_malformed(&mut self) {
        self.malformed += 1;
    }

    pub fn sent(&self) -> u64 {
        self.sent
    }
    pub fn increment_sent(&mut self) {
        self.sent += 1;
    }
}

impl fmt::Display for MessageCounts {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(
            f,
            "received={} malformed={} sent={}",
            self.received, self.malformed, self.sent
        )
    }
}
