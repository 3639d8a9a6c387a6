//! Basic pipeline usage example
//!
//! Demonstrates the console target, level filtering with tag overrides and
//! the host-driven `update` loop.
//!
//! Run with: cargo run --example basic_usage

use rust_log_pipeline::prelude::*;
use std::time::Duration;

fn main() -> Result<()> {
    println!("=== Rust Log Pipeline - Basic Usage Example ===\n");

    // Host-driven: nothing is written until update() or flush() runs
    let logger = Logger::builder()
        .min_level(LogLevel::Trace)
        .flush_interval(Duration::from_millis(16))
        .auto_flush(false)
        .target(ConsoleTarget::new())
        .build()?;

    println!("1. Logging at different levels:");
    logger.trace("This is a trace message");
    logger.debug("This is a debug message");
    logger.info("This is an info message");
    logger.warning("This is a warning message");
    logger.error("This is an error message");
    logger.critical("This is a critical message");
    logger.flush()?;

    println!("\n2. Raising the global level to INFO:");
    logger.set_min_level(LogLevel::Info)?;
    logger.debug("Debug message (hidden)");
    logger.info("Info message (visible)");
    logger.flush()?;

    println!("\n3. Quieting a noisy subsystem with a tag override:");
    logger.set_tag_level(LogTag::Physics, LogLevel::Error)?;
    logger.log_tagged(LogLevel::Info, LogTag::Physics, "Broadphase rebuilt (hidden)");
    logger.log_tagged(LogLevel::Error, LogTag::Physics, "Solver diverged (visible)");
    logger.log_tagged(LogLevel::Info, LogTag::Network, "Peer connected (visible)");
    logger.flush()?;

    println!("\n4. Macros skip formatting when the level is disabled:");
    rust_log_pipeline::debug!(logger, "never formatted: {:?}", vec![1, 2, 3]);
    rust_log_pipeline::warning!(logger, tag: LogTag::Audio, "{} voices dropped", 4);

    println!("\n5. Driving the pipeline from a frame loop:");
    for frame in 0..3 {
        logger.info(format!("frame {}", frame));
        std::thread::sleep(Duration::from_millis(20));
        if let Some(report) = logger.update()? {
            println!("   drained {} record(s)", report.processed);
        }
    }

    let snapshot = logger.metrics_snapshot();
    println!(
        "\nEnqueued: {}, filtered: {}, dropped: {}",
        snapshot.enqueued, snapshot.filtered, snapshot.dropped
    );

    logger.shutdown(DEFAULT_SHUTDOWN_TIMEOUT);
    println!("\n=== Example completed successfully! ===");

    Ok(())
}
