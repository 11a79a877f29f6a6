//! Conductor Gateway
//!
//! Axum-based HTTP surface for the orchestration service.
//!
//! # Endpoints
//!
//! | Method | Path | Description |
//! |--------|------|-------------|
//! | `GET`  | `/` | Service banner and endpoint index. |
//! | `GET`  | `/health` | Liveness: status, version, timestamp. |
//! | `GET`  | `/metrics` | Prometheus text exposition. |
//! | `GET`  | `/providers` | Supported provider names and the default. |
//! | `POST` | `/chat` | Single-turn chat, no session, no tools. |
//! | `POST` | `/orchestrate` | One-shot route + ReAct loop, no session. |
//! | `POST` | `/sessions` | Create a session. |
//! | `GET`  | `/sessions/{id}` | Session metadata. |
//! | `POST` | `/sessions/{id}/orchestrate` | Session-aware route + ReAct + summarize. |

pub mod error;
pub mod handlers;
pub mod middleware;
pub mod server;
pub mod state;

pub use error::{GatewayError, GatewayResult};
pub use server::{build_app, serve};
pub use state::AppState;
