//! Request handlers.

pub mod detect;
pub mod health;
pub mod live;

pub use detect::*;
pub use health::*;
pub use live::*;
