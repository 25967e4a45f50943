mod message;

pub use message::{Announcement, Body, Message, TableEntry, Withdrawal};
