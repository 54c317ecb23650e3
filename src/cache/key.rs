//! Cache key derivation.
//!
//! A [`CacheKey`] is the hex SHA-256 of [`KeyMaterial`]: the effective
//! provider, model, sampling parameters and every turn's role and content.
//! Each field is fed to the hasher in a fixed order, strings length-prefixed
//! and numbers as big-endian bytes, so the digest is stable across processes
//! and releases that keep [`KEY_SCHEMA_VERSION`].
//!
//! Request metadata (department and friends) is deliberately absent: two
//! callers asking the same thing share one entry.

use std::fmt;

use serde::Serialize;
use sha2::{Digest, Sha256};

use crate::config::SamplingDefaults;
use crate::providers::{ProviderConfig, ProviderKind};
use crate::types::{ChatRequest, Message};

/// Bump when the material layout changes, so old entries stop matching.
pub const KEY_SCHEMA_VERSION: u8 = 2;

/// Fixed-width request fingerprint (64 lowercase hex chars).
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey(String);

impl CacheKey {
    /// Fingerprint the output-relevant parts of `request` as they will
    /// actually be sent, i.e. after defaults and the active provider's model
    /// are applied.
    pub fn derive(
        request: &ChatRequest,
        provider: &ProviderConfig,
        defaults: &SamplingDefaults,
    ) -> Self {
        Self::from_material(&KeyMaterial::resolve(request, provider, defaults))
    }

    /// Fingerprint pre-resolved material.
    pub fn from_material(material: &KeyMaterial<'_>) -> Self {
        let mut hasher = Sha256::new();
        hasher.update([material.version]);
        update_str(&mut hasher, material.provider.as_str());
        update_str(&mut hasher, material.model);
        hasher.update(material.temperature.to_bits().to_be_bytes());
        hasher.update(material.max_tokens.to_be_bytes());
        hasher.update((material.messages.len() as u64).to_be_bytes());
        for message in material.messages {
            update_str(&mut hasher, message.role.as_str());
            update_str(&mut hasher, &message.content);
        }
        Self(hex::encode(hasher.finalize()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

fn update_str(hasher: &mut Sha256, value: &str) {
    hasher.update((value.len() as u64).to_be_bytes());
    hasher.update(value.as_bytes());
}

/// The output-relevant fields of one request.
#[derive(Debug, Clone, Serialize)]
pub struct KeyMaterial<'a> {
    pub version: u8,
    pub provider: ProviderKind,
    pub model: &'a str,
    pub temperature: f32,
    pub max_tokens: u32,
    pub messages: &'a [Message],
}

impl<'a> KeyMaterial<'a> {
    pub fn resolve(
        request: &'a ChatRequest,
        provider: &'a ProviderConfig,
        defaults: &SamplingDefaults,
    ) -> Self {
        Self {
            version: KEY_SCHEMA_VERSION,
            provider: provider.kind(),
            model: provider
                .effective_model(request.model.as_deref())
                .unwrap_or_default(),
            temperature: request.temperature.unwrap_or(defaults.temperature),
            max_tokens: request.max_tokens.unwrap_or(defaults.max_tokens),
            messages: &request.messages,
        }
    }
}
