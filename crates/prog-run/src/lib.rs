mod cli;
mod definition;

pub use cli::Cli;
pub use definition::{Parameter, ProgDefinition, ProgFile};
