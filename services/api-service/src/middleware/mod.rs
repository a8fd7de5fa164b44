mod jwt_auth;
mod metrics;

pub use jwt_auth::{issue_token, validate_token, Claims, JwtAuthMiddleware};
pub use metrics::MetricsMiddleware;
