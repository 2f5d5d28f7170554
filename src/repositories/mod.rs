//! Storage abstractions for channels and guides
//!
//! The refresh engine only talks to [`GuideSink`] and [`ChannelStore`].
//! `database` provides the SQLite implementation; [`MemoryStore`] keeps
//! everything in process and backs tests and `database.url = "memory"`.

pub mod memory;
pub mod traits;

pub use memory::MemoryStore;
pub use traits::*;
