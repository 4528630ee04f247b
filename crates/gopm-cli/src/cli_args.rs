use std::path::PathBuf;

use clap::Parser;

#[derive(Debug, Parser)]
#[command(
    name = "gopm",
    about = "Linear product-management agent served over OAuth and webhooks",
    version
)]
pub struct Cli {
    #[arg(
        long,
        env = "LINEAR_CLIENT_ID",
        help = "OAuth client id of the goPM Linear application"
    )]
    pub linear_client_id: String,

    #[arg(
        long,
        env = "LINEAR_CLIENT_SECRET",
        help = "OAuth client secret of the goPM Linear application"
    )]
    pub linear_client_secret: String,

    #[arg(
        long,
        env = "LINEAR_REDIRECT_URI",
        default_value = "http://localhost:3000/oauth/callback",
        help = "Redirect URI registered for the OAuth callback"
    )]
    pub linear_redirect_uri: String,

    #[arg(
        long,
        env = "LINEAR_API_KEY",
        help = "Legacy personal API key used when a workspace has no installed agent token"
    )]
    pub linear_api_key: Option<String>,

    #[arg(
        long,
        env = "LINEAR_WEBHOOK_SECRET",
        help = "When set, webhook requests must carry the linear-signature header"
    )]
    pub linear_webhook_secret: Option<String>,

    #[arg(
        long,
        env = "ANTHROPIC_API_KEY",
        help = "API key for the Anthropic messages endpoint"
    )]
    pub anthropic_api_key: String,

    #[arg(
        long,
        env = "GOPM_BIND",
        default_value = "0.0.0.0:3000",
        help = "Socket address the HTTP gateway binds to"
    )]
    pub bind: String,

    #[arg(
        long,
        env = "GOPM_TOKENS_FILE",
        default_value = ".gopm/workspace-tokens.json",
        help = "Path of the persisted workspace token file"
    )]
    pub tokens_file: PathBuf,

    #[arg(
        long,
        env = "GOPM_AUTHORIZE_URL",
        default_value = "https://linear.app/oauth/authorize",
        help = "Provider authorization endpoint"
    )]
    pub authorize_url: String,

    #[arg(
        long,
        env = "GOPM_TOKEN_URL",
        default_value = "https://api.linear.app/oauth/token",
        help = "Provider token exchange endpoint"
    )]
    pub token_url: String,

    #[arg(
        long,
        env = "GOPM_GRAPHQL_URL",
        default_value = "https://api.linear.app/graphql",
        help = "Linear GraphQL endpoint"
    )]
    pub graphql_url: String,

    #[arg(
        long,
        env = "GOPM_ANTHROPIC_API_BASE",
        default_value = "https://api.anthropic.com/v1",
        help = "Base URL for the Anthropic messages API"
    )]
    pub anthropic_api_base: String,

    #[arg(
        long,
        env = "GOPM_MODEL",
        default_value = "claude-3-5-sonnet-20241022",
        help = "Model used for PM review generation"
    )]
    pub model: String,

    #[arg(
        long,
        env = "GOPM_MAX_TOKENS",
        default_value_t = 2_000,
        help = "Maximum tokens requested per generation"
    )]
    pub max_tokens: u32,

    #[arg(
        long,
        env = "GOPM_LINEAR_TIMEOUT_MS",
        default_value_t = 30_000,
        help = "Request timeout for Linear and OAuth provider calls"
    )]
    pub linear_timeout_ms: u64,

    #[arg(
        long,
        env = "GOPM_ASSISTANT_TIMEOUT_MS",
        default_value_t = 120_000,
        help = "Request timeout for assistant generations"
    )]
    pub assistant_timeout_ms: u64,

    #[arg(
        long,
        env = "GOPM_RETRY_MAX_ATTEMPTS",
        default_value_t = 3,
        help = "Bounded retry attempts for retryable transport failures"
    )]
    pub retry_max_attempts: usize,

    #[arg(
        long,
        env = "GOPM_RETRY_BASE_DELAY_MS",
        default_value_t = 500,
        help = "Base delay of the exponential retry backoff"
    )]
    pub retry_base_delay_ms: u64,

    #[arg(
        long,
        env = "GOPM_SWEEP_INTERVAL_SECS",
        default_value_t = 600,
        help = "Interval of the background expiry sweep"
    )]
    pub sweep_interval_secs: u64,
}
