mod consumer;
mod message;
mod publisher;

pub use consumer::*;
pub use message::*;
pub use publisher::*;
