//! The five operator kernels a [`crate::graph::Graph`] composes.

pub mod fold;
pub mod join;
pub mod map;
pub mod reduce;
pub mod sort;

pub use fold::{fold, Folder};
pub use join::{join, JoinStrategy};
pub use map::{MapStream, Mapper};
pub use reduce::{GroupStream, ReduceStream, Reducer};
pub use sort::sort;
