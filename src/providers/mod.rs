//! Provider selection and the backend capability.
//!
//! - [`selector`] turns startup credentials into exactly one active
//!   [`ProviderConfig`].
//! - [`config`] holds that config and the single dispatch point that turns
//!   it into a [`CallTarget`].
//! - [`traits`] defines the [`CompletionBackend`] seam; [`openai`] is the
//!   shipped HTTP implementation.

pub mod config;
pub mod openai;
pub mod selector;
pub mod traits;

pub use config::{
    ApiKey, AuthHeader, AzureConfig, CallTarget, OpenAiConfig, ProviderConfig, ProviderKind,
};
pub use openai::HttpCompletionBackend;
pub use selector::{ProviderCredentials, select};
pub use traits::{Completion, CompletionBackend, CompletionRequest};
