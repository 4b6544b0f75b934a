pub mod compiler;
pub mod config;
pub mod diff;
pub mod drift;
pub mod error;
pub mod evaluation;
pub mod ir;
pub mod loader;
pub mod normalizer;
pub mod output;
pub mod pipeline;
pub mod promotion;
pub mod provider;
pub mod validator;

pub use error::OdlError;
pub use ir::OdlIr;
