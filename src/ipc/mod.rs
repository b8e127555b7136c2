pub mod bridge;
pub mod request;
pub mod surface;

pub use bridge::{Bridge, BridgeFunction, EXPOSED};
pub use request::{Request, Response};
pub use surface::{Collaborators, CommandSurface};
