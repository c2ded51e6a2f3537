//! Core data types for the Ethermine watch bot.

pub mod stats;
pub mod threshold;
pub mod users;

pub use stats::*;
pub use threshold::*;
pub use users::*;
