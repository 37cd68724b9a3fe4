//! Embedded scripting runtime
//!
//! The pool does not start the runtime. An application starts the
//! process-wide instance once, typically at the top of `main`:
//!
//! ```rust
//! let runtime = interpreter_pool::runtime::start();
//! assert!(runtime.is_started());
//! ```

mod script_runtime;

use std::sync::Arc;

pub use script_runtime::{ExecutionGuard, ScriptRuntime, RESULT_BINDING};

/// Start the process-wide runtime and return a handle to it. Idempotent.
pub fn start() -> Arc<ScriptRuntime> {
    let runtime = ScriptRuntime::global();
    runtime.start();
    runtime
}

/// Whether the process-wide runtime has been started
pub fn is_started() -> bool {
    ScriptRuntime::global().is_started()
}
