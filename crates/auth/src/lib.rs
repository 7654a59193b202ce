pub mod client;
pub mod config;
pub mod error;
pub mod form;
pub mod http;
pub mod login;
pub mod tokens;

#[cfg(test)]
pub(crate) mod testing;

pub use client::AuthenticatedClient;
pub use config::{AuthConfig, Credentials};
pub use error::{AuthError, AuthResult, FlowError};
pub use login::{LoginFlow, RedirectFragment};
pub use tokens::{TokenSet, TokenStore};
