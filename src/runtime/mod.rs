//! Frame-driven execution of a compiled controller.

pub mod replica;
pub mod session;
pub mod weights;

pub use replica::{FrameInput, FrameReport, Replica};
pub use session::{ReplicationChannel, Session, SessionReport};
pub use weights::LayerWeights;
