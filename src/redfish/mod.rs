pub mod client;
pub mod session;
pub mod types;
pub mod walker;

pub use client::{ClientSettings, RedfishClient};
pub use session::{Session, SessionStore};
pub use types::{ResourceDocument, ResourceKind};
pub use walker::{walk, WalkOutput, Walker};
