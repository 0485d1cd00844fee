mod exports;
mod factory;
mod property;
mod service;

pub use exports::*;
pub use factory::*;
pub use property::*;
pub use service::*;
