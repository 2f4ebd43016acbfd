mod interface;
mod memory;
#[cfg(feature = "sled")]
mod sled;
mod store;
#[cfg(test)]
mod tests;

pub use interface::*;
pub use memory::*;
#[cfg_attr(docsrs, doc(cfg(feature = "sled")))]
#[cfg(feature = "sled")]
pub use sled::*;
pub use store::*;
