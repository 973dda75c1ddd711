mod lease;
mod server;

pub use lease::*;
pub use server::*;
