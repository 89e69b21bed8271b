#![doc = include_str!("../README.md")]

pub mod error;
pub mod middleware;
pub mod mock_idam;
pub mod oidc;
pub mod pkce;
pub mod session;
pub mod tasklist;
pub mod token;
pub mod types;
pub mod views;

// Re-exports for convenient access
pub use error::Error;
pub use middleware::{AppConfig, AppState, app_routes, build_router};
pub use oidc::{OidcClient, OidcConfig, ProviderMetadata, TokenResponse, UserInfo};
pub use session::{
    AuthSession, MemoryStore, RedisStore, SessionManager, SessionState, SessionStore,
    parse_session_secret,
};
pub use tasklist::{TaskStatus, offset_date, task_list_warning_message, task_status};
pub use token::sub_from_id_token;
pub use types::{SessionId, Subject};
