pub mod validation;

pub use validation::{CredentialValidator, SERVICE_ROLE};
