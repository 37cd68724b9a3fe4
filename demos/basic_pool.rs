//! Basic interpreter pool usage
//!
//! Demonstrates initialization, prioritized scripts, module calls, scoped
//! acquisition and statistics.
//!
//! Run with: cargo run --example basic_pool

use interpreter_pool::prelude::*;
use std::time::Duration;

fn main() -> Result<()> {
    env_logger::init();
    println!("=== Interpreter Pool - Basic Usage Example ===\n");

    // The embedding server starts the runtime once
    let runtime = interpreter_pool::runtime::start();
    runtime.register_module(
        "mount",
        r#"
        fn slew(ra, dec, opts) {
            `slewing to ${ra}/${dec} at rate ${opts.rate}`
        }
        "#,
    )?;

    let config = PoolConfig::new(4)
        .with_max_queued_tasks(128)
        .with_thread_name_prefix("demo-interp")
        .with_preloaded_modules(["mount"]);
    let pool = InterpreterPool::with_runtime(config, runtime)?;
    pool.initialize()?;
    println!(
        "Pool initialized: {} slots, {} workers\n",
        pool.pool_size(),
        pool.worker_count()
    );

    // Scripts at mixed priorities
    let futures: Vec<_> = [
        ("result = 2 + 2", TaskPriority::Low),
        ("result = [1, 2, 3].len()", TaskPriority::Critical),
        ("result = \"ready\"", TaskPriority::High),
    ]
    .into_iter()
    .map(|(source, priority)| (source, pool.execute_script(source, None, None, priority)))
    .collect();

    for (source, future) in futures {
        let result = future.wait();
        println!(
            "{:<28} -> success={} value={} ({:?})",
            source, result.success, result.value, result.execution_time
        );
    }

    // Module function with keyword arguments
    let mut kwargs = Map::new();
    kwargs.insert("rate".into(), Dynamic::from(2_i64));
    let slew = pool
        .execute_function(
            "mount",
            "slew",
            vec![Dynamic::from(120_i64), Dynamic::from(45_i64)],
            kwargs,
            TaskPriority::High,
        )
        .wait();
    println!("\nmount.slew -> {}", slew.value);

    // Scoped acquisition
    {
        let guard = pool.acquire(Duration::from_secs(1))?;
        let value = guard.runtime().eval_expression("6 * 7")?;
        println!("\nSlot {} evaluated 6 * 7 = {}", guard.index(), value);
    }

    // Native task with a deadline
    let result = pool.execute(
        |runtime: &ScriptRuntime| runtime.eval_expression("40 + 2"),
        Duration::from_secs(5),
    )?;
    println!("Native task -> {}", result.value);

    let stats = pool.get_statistics();
    println!("\n=== Statistics ===");
    println!("{}", serde_json::to_string_pretty(&stats.to_json()).unwrap_or_default());
    println!("Success rate: {:.1}%", stats.success_rate());

    pool.shutdown(true);
    println!("\nPool shut down");
    Ok(())
}
