//! Dashboard endpoint paths and the lists of paths exempt from session gating.

pub const AUTHENTICATE: &str = "/api/authenticate";
pub const VALIDATE_AUTHENTICATION: &str = "/api/validateAuthentication";
pub const CSRF_TOKEN: &str = "/api/csrf-token";
pub const VALIDATE_CSRF: &str = "/api/validate-csrf";
pub const HANDSHAKE: &str = "/api/handshake";
pub const HEALTH: &str = "/api/health";
pub const SIGN_OUT: &str = "/api/signout";

pub const DASHBOARD_CONFIGURATION: &str = "/api/getDashboardConfiguration";
pub const CONFIGURATIONS: &str = "/api/getConfigurations";
pub const GET_PEER_SETTINGS: &str = "/api/get_peer_settings";
pub const GET_PEER_RATE_LIMIT: &str = "/api/get_peer_rate_limit";
pub const SET_PEER_RATE_LIMIT: &str = "/api/set_peer_rate_limit";
pub const REMOVE_PEER_RATE_LIMIT: &str = "/api/remove_peer_rate_limit";
pub const INTERFACE_SCHEDULER: &str = "/api/get_interface_scheduler";
pub const CONFIG_STATUS_STREAM: &str = "/api/config-status-stream";

/// Reads allowed while the session is expired.
const GET_EXEMPT: &[&str] = &[AUTHENTICATE, VALIDATE_AUTHENTICATION, CSRF_TOKEN, HEALTH];

/// Writes allowed while the session is expired; these also skip CSRF acquisition.
const POST_EXEMPT: &[&str] = &[AUTHENTICATE, VALIDATE_CSRF, HANDSHAKE, HEALTH];

pub fn is_get_exempt(path: &str) -> bool {
    GET_EXEMPT.iter().any(|exempt| path.contains(exempt))
}

pub fn is_post_exempt(path: &str) -> bool {
    POST_EXEMPT.iter().any(|exempt| path.contains(exempt))
}
