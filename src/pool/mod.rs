//! Interpreter pool, slots and workers

pub mod config;
pub mod guard;
pub mod interpreter_pool;
mod slots;
pub mod state;
pub mod stats;
pub mod worker;

pub use config::PoolConfig;
pub use guard::InterpreterGuard;
pub use interpreter_pool::InterpreterPool;
pub use state::PoolState;
pub use stats::PoolStats;
pub use worker::WorkerState;
