//! Image enrichment provider chain.
//!
//! The chain walks its providers in order, then a static placeholder, then
//! a synchronous emergency fallback. `resolve` is infallible: image
//! enrichment can only ever affect whether a variant carries an image,
//! never whether a run succeeds.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::time::timeout;
use tracing::{debug, warn};

use refract_core::types::ImageOutput;

use crate::generation::ServiceError;

/// One image synthesis backend.
#[async_trait]
pub trait ImageProvider: Send + Sync {
    fn name(&self) -> &str;

    async fn generate(&self, prompt: &str) -> Result<ImageOutput, ServiceError>;
}

/// Provider returning a fixed asset; useful as a stub backend and in tests.
pub struct StaticImageProvider {
    name: String,
    url: String,
}

impl StaticImageProvider {
    pub fn new(name: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            url: url.into(),
        }
    }
}

#[async_trait]
impl ImageProvider for StaticImageProvider {
    fn name(&self) -> &str {
        &self.name
    }

    async fn generate(&self, _prompt: &str) -> Result<ImageOutput, ServiceError> {
        Ok(ImageOutput {
            url: self.url.clone(),
            provider: self.name.clone(),
            placeholder: false,
        })
    }
}

/// Ordered fallback chain over image providers.
pub struct ImageChain {
    providers: Vec<Arc<dyn ImageProvider>>,
    placeholder_url: Option<String>,
    per_provider_timeout: Duration,
}

impl ImageChain {
    pub fn new(providers: Vec<Arc<dyn ImageProvider>>) -> Self {
        Self {
            providers,
            placeholder_url: None,
            per_provider_timeout: Duration::from_secs(30),
        }
    }

    /// Chain with no providers; resolves straight to the placeholder rung.
    pub fn empty() -> Self {
        Self::new(Vec::new())
    }

    pub fn with_placeholder(mut self, url: impl Into<String>) -> Self {
        self.placeholder_url = Some(url.into());
        self
    }

    pub fn with_timeout(mut self, per_provider_timeout: Duration) -> Self {
        self.per_provider_timeout = per_provider_timeout;
        self
    }

    /// Walk the chain until something yields an image. Never fails: the
    /// emergency rung is synchronous and always available.
    pub async fn resolve(&self, prompt: &str) -> ImageOutput {
        for provider in &self.providers {
            match timeout(self.per_provider_timeout, provider.generate(prompt)).await {
                Ok(Ok(image)) => {
                    debug!(provider = provider.name(), "image provider succeeded");
                    return image;
                }
                Ok(Err(e)) => {
                    warn!(provider = provider.name(), error = %e, "image provider failed");
                }
                Err(_) => {
                    warn!(provider = provider.name(), "image provider timed out");
                }
            }
        }

        if let Some(url) = &self.placeholder_url {
            return ImageOutput {
                url: url.clone(),
                provider: "placeholder".to_string(),
                placeholder: true,
            };
        }

        ImageOutput::emergency()
    }
}
