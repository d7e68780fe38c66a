pub mod model;
pub mod validator;

pub use model::ProviderConfig;
pub use validator::{ConfigurationValidator, ValidationReport};
