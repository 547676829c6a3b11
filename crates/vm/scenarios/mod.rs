//! End-to-end traces, asserted on the JSON a caller would receive.

mod helpers;

mod calls;
mod creation;
mod halts;
mod op_stack;
mod precompiles;
mod requests;
mod transfers;
