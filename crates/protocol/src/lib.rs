//! duplex-protocol – Netzwerkprotokoll-Definitionen
//!
//! Der Vertrag zwischen Client und Server: saemtliche Request-,
//! Response- und Event-Payloads als serde-Typen, dazu der Frame-Codec,
//! der sie ueber die TCP-Verbindung traegt.

pub mod control;
pub mod wire;

pub use control::{ControlMessage, ControlPayload, ErrorCode, PresenceStatus};
pub use wire::FrameCodec;
