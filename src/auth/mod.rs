//! Auth module: signed-in session and the identity providers behind it
//!
//! Tokens are resolved from the session cache, then silently, then
//! interactively, then by starting a redirect-style sign-in.

mod azure_cli;
mod device_code;
mod provider;
mod session;
mod token_store;

pub use azure_cli::AzureCliProvider;
pub use device_code::DeviceCodeProvider;
pub use provider::IdentityProvider;
pub use session::{AuthSession, GRAPH_SCOPES};
pub use token_store::TokenStore;

#[cfg(test)]
pub(crate) use session::tests as testing;
