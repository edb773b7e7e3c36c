pub mod annotate;
pub mod label;

pub use annotate::*;
pub use label::*;
