//! cloudbook-exec: local process execution
//!
//! Runs external tools as child processes with an explicit argv and environment,
//! so concurrent callers never share mutable process state.

pub mod error;
pub mod invocation;
pub mod local;
pub mod result;
pub mod traits;

pub use error::ExecError;
pub use invocation::Invocation;
pub use local::LocalExecutor;
pub use result::CommandResult;
pub use traits::CommandRunner;
