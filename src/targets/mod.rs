//! Target implementations

#[cfg(feature = "console")]
pub mod console;
#[cfg(feature = "file")]
pub mod file;
pub mod format;
#[cfg(feature = "file")]
pub mod json;
pub mod memory;
#[cfg(feature = "network")]
pub mod network;

#[cfg(feature = "console")]
pub use console::ConsoleTarget;
#[cfg(feature = "file")]
pub use file::FileTarget;
pub use format::TimestampFormat;
#[cfg(feature = "file")]
pub use json::JsonTarget;
pub use memory::MemoryTarget;
#[cfg(feature = "network")]
pub use network::NetworkTarget;

pub use crate::core::Target;
