//! Push channel module: frame decoding and the single duplex connection

pub mod channel;
pub mod events;

pub use channel::{ChannelState, PushChannel, PushError};
pub use events::{decode_frame, EventError, PushEvent, PushFrame};
