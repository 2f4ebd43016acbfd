mod chain_id;
mod factory;
mod interface;
mod prefetch_job;

pub use chain_id::*;
pub use factory::*;
pub use interface::*;
pub use prefetch_job::*;
