//! Infrastructure adapters: the coordinator/worker message transport.

pub mod channel;

pub use channel::{ChannelClosed, CoordinatorHub, Message, MessageKind, WorkerEndpoint};
