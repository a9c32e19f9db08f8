pub mod errors;
pub mod output;

pub use errors::*;
pub use output::*;
