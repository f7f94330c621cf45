pub mod auth;
pub mod context;
pub mod cors;
pub mod factory;
pub mod response;

pub use auth::TokenVerifier;
pub use context::RequestContext;
pub use cors::cors_layer;
pub use factory::{dispatch, wrap, HandlerConfig, Validator};
pub use response::{ApiResult, Envelope};
