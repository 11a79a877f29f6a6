//! Conductor gateway — entry point.
//!
//! Reads configuration from environment variables and starts the axum
//! service.
//!
//! # Environment variables
//!
//! | Variable | Default | Description |
//! |----------|---------|-------------|
//! | `PORT` | `8000` | TCP port to listen on. |
//! | `ENVIRONMENT` | `development` | `development`, `staging`, or `production`. |
//! | `CORS_ALLOWED_ORIGINS` | *(none)* | CSV origin allow-list (production). |
//! | `OPENAI_API_KEY` … `KIMI_K2_API_KEY` | *(none)* | Provider credentials. |

use conductor_core::Environment;
use conductor_gateway::server::{default_state, serve};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> std::io::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::from_default_env()
                .add_directive("conductor_gateway=info".parse().expect("static directive")),
        )
        .init();

    let port: u16 = std::env::var("PORT")
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(8000);
    let environment = Environment::from_env();

    let state = default_state(environment);
    serve(state, port).await
}
