pub mod backends;
pub mod config;
pub mod directory;
pub mod envelope;
pub mod event;
pub mod header;
pub mod mapping;
pub mod notifier;
pub mod pipeline;
pub mod stage;
pub mod stages;
pub mod storage;
pub mod transport;

#[cfg(test)]
mod testing;

pub use backends::*;
pub use config::*;
pub use directory::*;
pub use envelope::*;
pub use event::*;
pub use header::*;
pub use mapping::*;
pub use notifier::*;
pub use pipeline::*;
pub use stage::*;
pub use stages::*;
pub use storage::*;
pub use transport::*;
