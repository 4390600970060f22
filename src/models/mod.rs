mod deployment;
mod snapshot;

pub use deployment::*;
pub use snapshot::*;
