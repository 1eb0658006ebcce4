pub mod conversation;
pub mod generation;
pub mod ratio;

pub use conversation::*;
pub use generation::*;
pub use ratio::*;
