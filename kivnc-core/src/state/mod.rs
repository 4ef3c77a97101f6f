pub mod phase;
pub mod registry;

pub use phase::SessionPhase;
pub use registry::{SessionLease, SessionRegistry};
