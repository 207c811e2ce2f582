mod message;
mod openai;
mod pricing;
mod traits;

pub use message::{ChatMessage, GatewayReply, Role, Usage};
pub use openai::OpenAiGateway;
pub use pricing::Pricing;
pub use traits::{
    Gateway, GatewayConfig, GatewayError, Provider, DEFAULT_AZURE_API_VERSION,
    DEFAULT_OPENAI_BASE_URL,
};

/// Create a gateway for the configured provider
pub fn create_gateway(config: GatewayConfig) -> Result<Box<dyn Gateway>, GatewayError> {
    match config.provider {
        Provider::OpenAi | Provider::Azure => Ok(Box::new(OpenAiGateway::new(config)?)),
    }
}
