//! Assembly helpers - build engine components from configuration.
//!
//! The embedding layer owns process lifetime concerns (subscriber setup,
//! tracing installation); these helpers only translate config sections into
//! ready components.

use chrono::Duration;

use refract_config::{EventBusSettings, GenerationSettings};
use refract_services::{HttpGenerationClient, HttpGenerationConfig, ServiceError};
use refract_stores::{EventBusConfig, WorkflowEventBus};

/// Build the process-wide event bus sized from configuration.
pub fn event_bus_from_settings(settings: &EventBusSettings) -> WorkflowEventBus {
    WorkflowEventBus::new(EventBusConfig {
        channel_capacity: settings.channel_capacity,
        history_limit: settings.history_limit,
        max_subscribers: settings.max_subscribers,
        history_retention: Duration::seconds(settings.history_ttl_secs as i64),
    })
}

/// Build the HTTP generation client from configuration, resolving the API
/// key from the configured environment variable.
pub fn generation_client_from_settings(
    settings: &GenerationSettings,
) -> Result<HttpGenerationClient, ServiceError> {
    HttpGenerationClient::new(HttpGenerationConfig {
        endpoint: settings.endpoint.clone(),
        api_key: settings.resolve_api_key(),
        model: settings.model.clone(),
        temperature: settings.temperature,
        timeout_secs: settings.timeout_secs,
    })
}
