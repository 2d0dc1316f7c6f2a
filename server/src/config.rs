use clap::Args;

/// Connection details for the OpenAI-compatible chat completions endpoint.
/// Every upstream setting is required; there is no default model or key.
#[derive(Args, Clone, Debug)]
pub struct UpstreamArgs {
    #[arg(long, env = "OPENROUTER_API_KEY", hide_env_values = true)]
    pub api_key: String,
    #[arg(long, env = "OPENROUTER_API_URL")]
    pub api_url: String,
    #[arg(long, env = "OPENROUTER_ANALYZE_MODEL")]
    pub analyze_model: String,
    #[arg(long, env = "OPENROUTER_ANALYZE_TEMPERATURE")]
    pub analyze_temperature: f32,
    #[arg(long, env = "OPENROUTER_ANALYZE_MAX_TOKENS")]
    pub analyze_max_tokens: u32,
    #[arg(long, env = "OPENROUTER_GENERATE_MODEL")]
    pub generate_model: String,
    #[arg(long, env = "OPENROUTER_GENERATE_TEMPERATURE")]
    pub generate_temperature: f32,
    #[arg(long, env = "OPENROUTER_GENERATE_MAX_TOKENS")]
    pub generate_max_tokens: u32,
    #[arg(long, env = "APP_REFERER", default_value = "http://localhost:3000")]
    pub referer: String,
    #[arg(long, env = "APP_TITLE", default_value = "Peel a Banana")]
    pub title: String,
}

#[derive(Clone, Debug, PartialEq)]
pub struct ModelSettings {
    pub model: String,
    pub temperature: f32,
    pub max_tokens: u32,
}

impl UpstreamArgs {
    pub fn analyze_settings(&self) -> ModelSettings {
        ModelSettings {
            model: self.analyze_model.clone(),
            temperature: self.analyze_temperature,
            max_tokens: self.analyze_max_tokens,
        }
    }

    pub fn generate_settings(&self) -> ModelSettings {
        ModelSettings {
            model: self.generate_model.clone(),
            temperature: self.generate_temperature,
            max_tokens: self.generate_max_tokens,
        }
    }
}
