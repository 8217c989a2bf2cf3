use super::*;
use std::collections::HashMap;

fn valid_config() -> Config {
    let mut cfg = Config::default();
    cfg.auth.jwt_secret = "s3cret".into();
    cfg.evolution.base_url = "http://localhost:8080".into();
    cfg
}

#[test]
fn test_defaults() {
    let cfg = Config::default();
    assert_eq!(cfg.api.port, 3001);
    assert_eq!(cfg.api.body_limit_bytes, 2 * 1024 * 1024);
    assert_eq!(cfg.auth.jwt_ttl_hours, 168);
    assert_eq!(cfg.dispatch.default_delay_ms, 5000);
    assert_eq!(cfg.dispatch.min_delay_ms, 3000);
    assert_eq!(cfg.dispatch.max_delay_ms, 30000);
}

#[test]
fn test_partial_toml_fills_defaults() {
    let toml_str = r#"
        [evolution]
        base_url = "https://evo.example.com"
        api_key = "abc"

        [dispatch]
        max_delay_ms = 60000
    "#;
    let cfg: Config = toml::from_str(toml_str).unwrap();
    assert_eq!(cfg.evolution.base_url, "https://evo.example.com");
    assert_eq!(cfg.dispatch.max_delay_ms, 60000);
    assert_eq!(cfg.dispatch.min_delay_ms, 3000);
    assert_eq!(cfg.api.host, "0.0.0.0");
    assert_eq!(cfg.panel.log_level, "info");
}

#[test]
fn test_clamp_delay_law() {
    let d = DispatchConfig::default();
    assert_eq!(d.clamp_delay(None), 5000);
    assert_eq!(d.clamp_delay(Some(0)), 5000);
    // Under the floor resolves to the default, not the floor.
    assert_eq!(d.clamp_delay(Some(2999)), 5000);
    assert_eq!(d.clamp_delay(Some(1)), 5000);
    assert_eq!(d.clamp_delay(Some(3000)), 3000);
    assert_eq!(d.clamp_delay(Some(4000)), 4000);
    assert_eq!(d.clamp_delay(Some(30000)), 30000);
    assert_eq!(d.clamp_delay(Some(30001)), 30000);
    assert_eq!(d.clamp_delay(Some(u64::MAX)), 30000);
}

#[test]
fn test_clamp_delay_with_floor_equal_to_default() {
    let d = DispatchConfig {
        default_delay_ms: 5000,
        min_delay_ms: 5000,
        max_delay_ms: 30000,
    };
    assert_eq!(d.clamp_delay(Some(2000)), 5000);
    assert_eq!(d.clamp_delay(Some(7000)), 7000);
}

#[test]
fn test_env_overrides() {
    let env: HashMap<&str, &str> = [
        ("EVOLUTION_API_URL", "http://evo:8080"),
        ("EVOLUTION_API_KEY", "key"),
        ("JWT_SECRET", "jwt"),
        ("PAINEL_API_TOKEN", "panel"),
        ("FRONTEND_URL", "http://localhost:5173"),
        ("PORT", "4000"),
    ]
    .into_iter()
    .collect();

    let mut cfg = Config::default();
    cfg.apply_overrides_from(|k| env.get(k).map(|v| v.to_string()));
    assert_eq!(cfg.evolution.base_url, "http://evo:8080");
    assert_eq!(cfg.evolution.api_key, "key");
    assert_eq!(cfg.auth.jwt_secret, "jwt");
    assert_eq!(cfg.auth.panel_token, "panel");
    assert_eq!(cfg.api.cors_origin, "http://localhost:5173");
    assert_eq!(cfg.api.port, 4000);
}

#[test]
fn test_env_overrides_skip_empty_and_invalid() {
    let mut cfg = Config::default();
    cfg.auth.jwt_secret = "from-file".into();
    cfg.apply_overrides_from(|k| match k {
        "JWT_SECRET" => Some("   ".into()),
        "PORT" => Some("not-a-port".into()),
        _ => None,
    });
    assert_eq!(cfg.auth.jwt_secret, "from-file");
    assert_eq!(cfg.api.port, 3001);
}

#[test]
fn test_validate_ok() {
    assert!(valid_config().validate().is_ok());
}

#[test]
fn test_validate_rejects_inverted_bounds() {
    let mut cfg = valid_config();
    cfg.dispatch.min_delay_ms = 40000;
    let err = cfg.validate().unwrap_err();
    assert!(err.to_string().contains("min_delay_ms"));
}

#[test]
fn test_validate_rejects_default_outside_bounds() {
    let mut cfg = valid_config();
    cfg.dispatch.default_delay_ms = 1000;
    assert!(cfg.validate().is_err());
}

#[test]
fn test_validate_requires_secret_and_base_url() {
    let mut cfg = valid_config();
    cfg.auth.jwt_secret.clear();
    assert!(cfg.validate().unwrap_err().to_string().contains("JWT_SECRET"));

    let mut cfg = valid_config();
    cfg.evolution.base_url = " ".into();
    assert!(cfg
        .validate()
        .unwrap_err()
        .to_string()
        .contains("EVOLUTION_API_URL"));
}

#[test]
fn test_load_missing_file_uses_defaults() {
    let cfg = load("/nonexistent/__evopanel__/config.toml").unwrap();
    assert_eq!(cfg.api.port, 3001);
}

#[test]
fn test_load_from_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("config.toml");
    std::fs::write(
        &path,
        "[api]\nport = 8088\n\n[auth]\njwt_secret = \"x\"\npanel_token = \"tok\"\n",
    )
    .unwrap();
    let cfg = load(path.to_str().unwrap()).unwrap();
    assert_eq!(cfg.api.port, 8088);
    assert_eq!(cfg.auth.jwt_secret, "x");
    assert_eq!(cfg.auth.panel_token, "tok");
    assert_eq!(cfg.auth.jwt_ttl_hours, 168);
}

#[test]
fn test_load_invalid_toml() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("config.toml");
    std::fs::write(&path, "[api\nport = ").unwrap();
    let err = load(path.to_str().unwrap()).unwrap_err();
    assert!(matches!(err, PanelError::Config(_)));
}

#[test]
fn test_shellexpand_leaves_absolute_paths() {
    assert_eq!(shellexpand("/var/lib/panel.db"), "/var/lib/panel.db");
}
