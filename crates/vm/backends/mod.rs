pub mod levm;

pub use levm::LEVM;
