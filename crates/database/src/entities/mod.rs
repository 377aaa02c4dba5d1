//! Domain entities for the database layer

pub mod being;
pub mod message;

pub use being::{Being, BeingStatus, CreateBeingRequest};
pub use message::{
    Attachment, Message, MessagePriority, MessageQuery, MessageStatus, BROADCAST_RECIPIENT,
};
