pub mod brain;
pub mod config;
pub mod error;
pub mod face;
pub mod prompts;
pub mod relay;
pub mod types;

pub use brain::{Brain, BrainError, GeminiBrain, Generation};
pub use config::Config;
pub use error::{ApiError, Operation};
pub use relay::Relay;
