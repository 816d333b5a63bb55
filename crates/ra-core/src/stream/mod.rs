//! Inbound alert stream: transport, self-healing read loop, liveness heartbeat.

pub mod connection;
pub mod heartbeat;
pub mod transport;

pub use connection::{BackoffPolicy, Disconnect, StreamConnection};
pub use heartbeat::Heartbeat;
pub use transport::{HttpTransport, LineStream, StreamTransport};
