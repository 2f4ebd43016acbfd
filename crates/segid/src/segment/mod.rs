mod interface;
mod merged;
mod plain;
mod reserved;

pub use interface::*;
pub use merged::*;
pub use plain::*;
pub use reserved::*;
