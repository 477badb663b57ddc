//! Route paths served by the API.

pub const POST_AI_GENERATE: &str = "/api/v1/ai/generate";
pub const POST_AUTH_GOOGLE_REFRESH: &str = "/api/v1/auth/google/refresh";

/// Header naming the upstream platform of a generation.
pub const PLATFORM_HEADER: &str = "platform";
/// Header naming the upstream model of a generation.
pub const MODEL_HEADER: &str = "model";
/// Header carrying the refresh token on the refresh route.
pub const REFRESH_TOKEN_HEADER: &str = "x-refresh-token";
