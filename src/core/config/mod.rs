pub mod data;
pub mod io;


pub use data::{Config, ConfigOverrides, ResolvedConfig};
pub use io::ConfigError;
