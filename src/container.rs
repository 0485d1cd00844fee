mod builder;
#[allow(clippy::module_inception)]
mod container;
mod lint;

pub use builder::*;
pub use container::*;
