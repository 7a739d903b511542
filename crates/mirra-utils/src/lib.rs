//! Leaf helpers shared by every mirra crate.

pub mod error;
pub mod hash;
pub mod lock;
pub mod name;
pub mod path;
pub mod time;
