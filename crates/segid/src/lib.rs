mod chain;
mod config;
mod distributor;
mod error;
mod generator;
mod prefetch;
mod segment;
mod time;

pub use crate::chain::*;
pub use crate::config::*;
pub use crate::distributor::*;
pub use crate::error::*;
pub use crate::generator::*;
pub use crate::prefetch::*;
pub use crate::segment::*;
pub use crate::time::*;
