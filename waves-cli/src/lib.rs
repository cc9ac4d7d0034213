pub mod config;
pub mod convert;

pub use config::WavesConfig;
pub use convert::{InputFormat, Inspection};
