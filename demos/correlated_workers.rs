//! Correlation across worker threads
//!
//! A request scope is opened on the main thread, carried to a pool of
//! workers and resumed there, so every record shares one correlation id.
//! Scope lifecycle events are printed through a subscriber.
//!
//! Run with: cargo run --example correlated_workers

use rust_log_pipeline::core::Properties;
use rust_log_pipeline::prelude::*;
use std::sync::Arc;
use std::thread;
use std::time::Duration;

fn main() -> Result<()> {
    println!("=== Rust Log Pipeline - Correlated Workers Example ===\n");

    let memory = MemoryTarget::new("memory");
    let logger = Arc::new(
        Logger::builder()
            .min_level(LogLevel::Debug)
            .flush_interval(Duration::from_millis(10))
            .target(ConsoleTarget::new())
            .target(memory.clone())
            .subscribe(|event| {
                if let PipelineEvent::ScopeCompleted {
                    operation, duration, ..
                } = event
                {
                    println!("   [event] scope '{}' finished in {:?}", operation, duration);
                }
            })
            .build()?,
    );

    let request = logger.correlation().start_scope(
        "handle_request",
        None,
        Some(Properties::new().with("route", "/orders").with("method", "POST")),
    );
    logger.info("Request received");

    let carried = logger.correlation().carry();
    let workers: Vec<_> = (0..3)
        .map(|worker| {
            let logger = Arc::clone(&logger);
            let carried = carried.clone();
            thread::Builder::new()
                .name(format!("worker-{}", worker))
                .spawn(move || {
                    let _scope = carried
                        .as_ref()
                        .map(|context| context.resume(logger.correlation(), "process_shard"));
                    for step in 0..2 {
                        logger.log_record(
                            LogRecord::new(LogLevel::Debug, LogTag::Default, "Shard step done")
                                .with_property("worker", worker as u64)
                                .with_property("step", step as u64),
                        );
                    }
                })
        })
        .collect::<std::io::Result<Vec<_>>>()?;

    for worker in workers {
        if worker.join().is_err() {
            logger.error("Worker panicked");
        }
    }

    logger.info("Request completed");
    let correlation_id = request.correlation_id().to_string();
    drop(request);

    logger.flush()?;

    let matching = memory
        .records()
        .iter()
        .filter(|record| record.correlation_id() == Some(correlation_id.as_str()))
        .count();
    println!(
        "\n{} of {} record(s) carry correlation id {}",
        matching,
        memory.len(),
        correlation_id
    );
    println!("Active scopes left: {}", logger.correlation().active_scopes().len());

    println!("\n=== Example completed successfully! ===");

    Ok(())
}
