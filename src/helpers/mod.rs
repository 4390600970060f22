pub mod credentials;
pub(crate) mod json;
pub mod remote;

pub use json::*;
