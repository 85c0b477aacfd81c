pub mod book;
pub mod errors;

pub use book::*;
pub use errors::*;
