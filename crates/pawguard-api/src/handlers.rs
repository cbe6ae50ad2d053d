//! Request handlers.

pub mod detect;
pub mod health;
pub mod meta;

pub use detect::*;
pub use health::*;
pub use meta::*;
