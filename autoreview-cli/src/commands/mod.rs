//! CLI command implementations

pub mod parse;
pub mod review;
pub mod run;

pub use parse::ParseArgs;
pub use review::ReviewArgs;
pub use run::RunArgs;
