//! Child host process management

pub mod spawner;

pub use spawner::{HostProcess, HostProcessSpawner, CONSTRUCTOR_OPTIONS_FLAG};
