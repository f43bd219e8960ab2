//! Tools the engine implements itself

use super::adapter::{AdapterError, Invocation, ToolAdapter};
use crate::config::ServiceSettings;
use crate::rate_limit::RateLimiter;
use crate::registry::{FunctionDescriptor, FunctionRegistry, ParamType, RegistryResult};
use async_trait::async_trait;
use serde_json::{json, Value};
use std::sync::Arc;

pub const GET_API_LIMITS: &str = "get_api_limits";
pub const UPDATE_CONFIG: &str = "update_config";

pub fn get_api_limits_descriptor() -> FunctionDescriptor {
    FunctionDescriptor::new(
        GET_API_LIMITS,
        "Report the upstream API tier, remaining requests and next reset",
    )
}

pub fn update_config_descriptor() -> FunctionDescriptor {
    FunctionDescriptor::new(UPDATE_CONFIG, "Change a service setting")
        .with_param("key", ParamType::String, "Setting name, e.g. TWITTER_API_TIER")
        .with_param("value", ParamType::String, "New value")
}

/// Reports the limiter status
pub struct ApiLimitsTool {
    limiter: RateLimiter,
}

impl ApiLimitsTool {
    pub fn new(limiter: RateLimiter) -> Self {
        Self { limiter }
    }
}

#[async_trait]
impl ToolAdapter for ApiLimitsTool {
    async fn invoke(&self, _invocation: Invocation) -> Result<Value, AdapterError> {
        serde_json::to_value(self.limiter.status())
            .map_err(|e| AdapterError::permanent(e.to_string()))
    }
}

/// Applies setting changes; tier changes go through the settings' limiter
pub struct UpdateConfigTool {
    settings: Arc<ServiceSettings>,
}

impl UpdateConfigTool {
    pub fn new(settings: Arc<ServiceSettings>) -> Self {
        Self { settings }
    }
}

#[async_trait]
impl ToolAdapter for UpdateConfigTool {
    async fn invoke(&self, invocation: Invocation) -> Result<Value, AdapterError> {
        let key = invocation
            .str_argument("key")
            .ok_or_else(|| AdapterError::permanent("missing key"))?;
        let value = invocation
            .str_argument("value")
            .ok_or_else(|| AdapterError::permanent("missing value"))?;

        self.settings
            .apply(key, value)
            .map_err(|e| AdapterError::permanent(e.to_string()))?;

        Ok(json!({
            "key": key,
            "value": self.settings.get(key),
            "settings": self.settings.snapshot(),
        }))
    }
}

/// Register both built-in tools
pub fn register(
    registry: &FunctionRegistry,
    limiter: RateLimiter,
    settings: Arc<ServiceSettings>,
) -> RegistryResult<()> {
    registry.register_tool(
        get_api_limits_descriptor(),
        Arc::new(ApiLimitsTool::new(limiter.clone())),
    )?;
    registry.register_tool(
        update_config_descriptor(),
        Arc::new(UpdateConfigTool::new(settings)),
    )?;
    Ok(())
}
