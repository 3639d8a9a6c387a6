//! File logging example
//!
//! Demonstrates fanning one stream out to a console, a text file and an
//! NDJSON file, each with its own minimum level, plus channel routing.
//!
//! Run with: cargo run --example file_logging

use rust_log_pipeline::prelude::*;

const AUDIT: LogTag = LogTag::Custom(1);

fn main() -> Result<()> {
    println!("=== Rust Log Pipeline - File Logging Example ===\n");

    let logger = Logger::builder()
        .min_level(LogLevel::Debug)
        .target_with(ConsoleTarget::new(), TargetOptions::min_level(LogLevel::Warning))
        .target(FileTarget::new("application.log")?.named("file"))
        .target_with(
            JsonTarget::new("application.ndjson")?.named("json"),
            TargetOptions::min_level(LogLevel::Info),
        )
        .channel(
            Channel::new("audit")
                .with_min_level(LogLevel::Info)
                .allow_tag(AUDIT)
                .with_target("json"),
        )
        .build()?;

    println!("1. Console shows WARN and above, the text file gets everything:");
    logger.info("Application started");
    logger.debug("Loading configuration...");
    logger.warning("Using default settings for some options");
    logger.log_record(
        LogRecord::new(LogLevel::Info, LogTag::Network, "Connecting to database")
            .with_property("host", "db.internal")
            .with_property("port", 5432),
    );

    println!("\n2. Audit-tagged records only reach the JSON file:");
    logger.log_record(
        LogRecord::new(LogLevel::Info, AUDIT, "User role changed")
            .with_property("user", "alice")
            .with_property("role", "admin"),
    );
    logger.log_record(
        LogRecord::new(LogLevel::Warning, LogTag::Default, "Password policy relaxed")
            .with_channel("audit"),
    );

    println!("\n3. Errors carry their cause chain:");
    let cause = std::io::Error::new(std::io::ErrorKind::NotFound, "plugin.so missing");
    logger.log_error(LogLevel::Error, "Failed to load optional plugin", &cause);

    for i in 1..=5 {
        logger.info(format!("Processing item {}/5", i));
    }

    let report = logger.flush()?;
    println!("\nFlushed {} record(s)", report.processed);
    for (name, healthy) in logger.health_status() {
        println!("   target {:<8} healthy={}", name, healthy);
    }

    println!("\n=== Example completed successfully! ===");
    println!("Check 'application.log' and 'application.ndjson' for the output");

    Ok(())
}
