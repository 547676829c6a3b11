pub mod default_hook;
pub mod hook;
pub mod op_stack_hook;

pub use default_hook::DefaultHook;
pub use op_stack_hook::OpStackHook;
