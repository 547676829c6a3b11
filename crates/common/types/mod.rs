mod account;
mod log;
mod transaction;

pub use account::*;
pub use log::*;
pub use transaction::*;
