pub mod identity;
pub mod observation;
pub mod roster;

pub use identity::*;
pub use observation::*;
pub use roster::Roster;
