//! Per-service-channel high-level operations.
//!
//! Each manager owns only its own cached state and events — it never
//! holds a reference back to [`crate::engine::SessionEngine`]. Inbound
//! traffic is applied by the engine calling a manager's `handle_message`
//! (or, for Stump, `handle_json`) as it demultiplexes by channel;
//! outbound operations return an encoded [`smartglass_protocol::payloads::Payload`]
//! (or, for Stump, a JSON value) for the engine to actually send, rather
//! than sending it themselves. That keeps the one place that knows how
//! to stamp sequence numbers and wait for acks — the engine — in sole
//! charge of the wire.

pub mod input;
pub mod media;
pub mod stump;
pub mod text;
pub mod title;

pub use input::InputManager;
pub use media::MediaManager;
pub use stump::StumpManager;
pub use text::TextManager;
pub use title::TitleManager;
