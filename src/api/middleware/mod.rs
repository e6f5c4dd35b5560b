pub mod security;
pub mod shield;
pub mod trace;

pub use security::*;
pub use shield::*;
pub use trace::*;
