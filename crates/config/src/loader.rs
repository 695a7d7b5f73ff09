use std::path::{Path, PathBuf};

use {
    secrecy::Secret,
    tracing::{debug, warn},
};

use crate::{env_subst::substitute_env, schema::WardenConfig};

/// Standard config file names, checked in order.
const CONFIG_FILENAMES: &[&str] = &["warden.toml", "warden.yaml", "warden.yml", "warden.json"];

/// Load config from the given path (any supported format).
pub fn load_config(path: &Path) -> anyhow::Result<WardenConfig> {
    let raw = std::fs::read_to_string(path)
        .map_err(|e| anyhow::anyhow!("failed to read {}: {e}", path.display()))?;
    let raw = substitute_env(&raw);
    parse_config(&raw, path)
}

/// Discover and load config from standard locations.
///
/// Search order:
/// 1. `./warden.{toml,yaml,yml,json}` (project-local)
/// 2. `~/.config/warden/warden.{toml,yaml,yml,json}` (user-global)
///
/// Returns `WardenConfig::default()` only when no config file exists. A file
/// that exists but cannot be read or parsed is an error, never a silent
/// fallback to the disabled default.
pub fn discover_and_load() -> anyhow::Result<(WardenConfig, Option<PathBuf>)> {
    load_discovered(find_config_file())
}

fn load_discovered(path: Option<PathBuf>) -> anyhow::Result<(WardenConfig, Option<PathBuf>)> {
    let Some(path) = path else {
        debug!("no config file found, using defaults");
        return Ok((WardenConfig::default(), None));
    };
    debug!(path = %path.display(), "loading config");
    let config = load_config(&path)?;
    Ok((config, Some(path)))
}

/// Find the first config file in standard locations.
pub fn find_config_file() -> Option<PathBuf> {
    if let Some(p) = find_in_dir(Path::new(".")) {
        return Some(p);
    }
    config_dir().and_then(|dir| find_in_dir(&dir))
}

fn find_in_dir(dir: &Path) -> Option<PathBuf> {
    CONFIG_FILENAMES
        .iter()
        .map(|name| dir.join(name))
        .find(|p| p.exists())
}

/// Returns the user-global config directory (`~/.config/warden/`).
pub fn config_dir() -> Option<PathBuf> {
    directories::ProjectDirs::from("", "", "warden").map(|d| d.config_dir().to_path_buf())
}

/// Apply `WARDEN_*` environment overrides on top of a parsed config.
///
/// `WARDEN_API_HOST`, `WARDEN_API_KEY` and `WARDEN_NODE_ID` win over file values.
/// Setting any of them does not implicitly enable the panel.
pub fn apply_env_overrides(config: WardenConfig) -> WardenConfig {
    apply_overrides_with(config, |name| std::env::var(name).ok())
}

fn apply_overrides_with(
    mut config: WardenConfig,
    lookup: impl Fn(&str) -> Option<String>,
) -> WardenConfig {
    if let Some(host) = lookup("WARDEN_API_HOST") {
        config.panel.api_host = host;
    }
    if let Some(key) = lookup("WARDEN_API_KEY") {
        config.panel.api_key = Secret::new(key);
    }
    if let Some(raw) = lookup("WARDEN_NODE_ID") {
        match raw.trim().parse::<u32>() {
            Ok(id) => config.panel.node_id = id,
            Err(e) => warn!(value = %raw, error = %e, "ignoring invalid WARDEN_NODE_ID"),
        }
    }
    config
}

fn parse_config(raw: &str, path: &Path) -> anyhow::Result<WardenConfig> {
    let ext = path.extension().and_then(|e| e.to_str()).unwrap_or("toml");

    match ext {
        "toml" => Ok(toml::from_str(raw)?),
        "yaml" | "yml" => Ok(serde_yaml::from_str(raw)?),
        "json" => Ok(serde_json::from_str(raw)?),
        _ => anyhow::bail!("unsupported config format: .{ext}"),
    }
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use {super::*, secrecy::ExposeSecret};

    #[test]
    fn loads_toml_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("warden.toml");
        std::fs::write(
            &path,
            "[panel]\nenabled = true\napi_host = \"https://p.example\"\napi_key = \"k\"\nnode_id = 9\n\n[sync]\ninterval_secs = 60\n",
        )
        .unwrap();

        let cfg = load_config(&path).unwrap();
        assert!(cfg.panel.enabled);
        assert_eq!(cfg.panel.node_id, 9);
        assert_eq!(cfg.sync.interval_secs, 60);
        assert_eq!(cfg.sync.request_timeout_secs, 10);
    }

    #[test]
    fn loads_yaml_and_json() {
        let dir = tempfile::tempdir().unwrap();

        let yaml = dir.path().join("warden.yaml");
        std::fs::write(&yaml, "panel:\n  node_id: 4\n  node_type: vless\n").unwrap();
        let cfg = load_config(&yaml).unwrap();
        assert_eq!(cfg.panel.node_id, 4);
        assert_eq!(cfg.panel.node_type, "vless");

        let json = dir.path().join("warden.json");
        std::fs::write(&json, r#"{"sync": {"flush_before_revoke": true}}"#).unwrap();
        let cfg = load_config(&json).unwrap();
        assert!(cfg.sync.flush_before_revoke);
    }

    #[test]
    fn rejects_unknown_extension() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("warden.ini");
        std::fs::write(&path, "x=1").unwrap();
        let err = load_config(&path).unwrap_err();
        assert!(err.to_string().contains("unsupported config format"));
    }

    #[test]
    fn missing_file_names_the_path() {
        let err = load_config(Path::new("/nonexistent/warden.toml")).unwrap_err();
        assert!(err.to_string().contains("/nonexistent/warden.toml"));
    }

    #[test]
    fn finds_first_supported_name_in_dir() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("warden.json"), "{}").unwrap();
        std::fs::write(dir.path().join("warden.toml"), "").unwrap();
        let found = find_in_dir(dir.path()).unwrap();
        assert!(found.ends_with("warden.toml"));
    }

    #[test]
    fn malformed_discovered_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join("warden.toml"),
            "[panel]\nenabled = true\napi_host = \"https://p.example\"\napi_key = \"k\"\nnode_id = \"9x\"\n",
        )
        .unwrap();

        let found = find_in_dir(dir.path());
        assert!(found.is_some());
        let err = load_discovered(found).unwrap_err();
        assert!(err.to_string().contains("9x"), "{err}");
    }

    #[test]
    fn no_discovered_file_uses_defaults() {
        let (cfg, path) = load_discovered(None).unwrap();
        assert!(path.is_none());
        assert!(!cfg.panel.enabled);
    }

    #[test]
    fn env_overrides_replace_panel_fields() {
        let cfg = apply_overrides_with(WardenConfig::default(), |name| match name {
            "WARDEN_API_HOST" => Some("https://override.example".into()),
            "WARDEN_API_KEY" => Some("env-key".into()),
            "WARDEN_NODE_ID" => Some(" 42 ".into()),
            _ => None,
        });
        assert_eq!(cfg.panel.api_host, "https://override.example");
        assert_eq!(cfg.panel.api_key.expose_secret(), "env-key");
        assert_eq!(cfg.panel.node_id, 42);
        assert!(!cfg.panel.enabled);
    }

    #[test]
    fn invalid_node_id_override_is_ignored() {
        let mut base = WardenConfig::default();
        base.panel.node_id = 5;
        let cfg = apply_overrides_with(base, |name| {
            (name == "WARDEN_NODE_ID").then(|| "not-a-number".to_string())
        });
        assert_eq!(cfg.panel.node_id, 5);
    }
}
