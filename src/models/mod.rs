pub mod keymap;
pub mod utterance;

pub use keymap::*;
pub use utterance::*;
