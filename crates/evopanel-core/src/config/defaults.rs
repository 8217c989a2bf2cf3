// --- Default value functions ---

pub(super) fn default_name() -> String {
    "evopanel".to_string()
}
pub(super) fn default_data_dir() -> String {
    "~/.evopanel".to_string()
}
pub(super) fn default_log_level() -> String {
    "info".to_string()
}
pub(super) fn default_api_host() -> String {
    "0.0.0.0".to_string()
}
pub(super) fn default_api_port() -> u16 {
    3001
}
pub(super) fn default_body_limit() -> usize {
    2 * 1024 * 1024
}
pub(super) fn default_jwt_ttl_hours() -> u64 {
    24 * 7
}
pub(super) fn default_db_path() -> String {
    "~/.evopanel/data/panel.db".to_string()
}
pub(super) fn default_delay_ms() -> u64 {
    5_000
}
pub(super) fn default_min_delay_ms() -> u64 {
    3_000
}
pub(super) fn default_max_delay_ms() -> u64 {
    30_000
}
