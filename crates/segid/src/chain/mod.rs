mod node;
mod segment_chain;

pub use node::*;
pub use segment_chain::*;
