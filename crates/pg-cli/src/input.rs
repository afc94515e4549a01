use std::fs;
use std::path::Path;

use pg_core::{DetectorConfig, Viewport};
use serde::de::DeserializeOwned;

pub fn read_json<T: DeserializeOwned>(path: &Path) -> Result<T, String> {
    let text = fs::read_to_string(path)
        .map_err(|e| format!("Failed to read '{}': {}", path.display(), e))?;
    serde_json::from_str(&text).map_err(|e| format!("Invalid JSON in '{}': {}", path.display(), e))
}

/// Defaults when no file is given. Out-of-range values are clamped with a warning.
pub fn load_config(path: Option<&str>) -> Result<DetectorConfig, String> {
    let Some(path) = path else {
        return Ok(DetectorConfig::default());
    };
    let text = fs::read_to_string(path).map_err(|e| format!("Failed to read '{}': {}", path, e))?;
    DetectorConfig::from_json(&text).map_err(|e| format!("Invalid config '{}': {}", path, e))
}

/// Parse `WIDTHxHEIGHT`, e.g. `1920x1080`.
pub fn parse_viewport(s: &str) -> Result<Viewport, String> {
    let (w, h) = s
        .split_once(['x', 'X'])
        .ok_or_else(|| format!("Invalid viewport '{}': expected WIDTHxHEIGHT", s))?;
    let parse = |v: &str| {
        v.trim()
            .parse::<f64>()
            .ok()
            .filter(|n| n.is_finite() && *n > 0.0)
            .ok_or_else(|| format!("Invalid viewport '{}': bad dimension '{}'", s, v))
    };
    Ok(Viewport::new(parse(w)?, parse(h)?))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_viewport() {
        assert_eq!(parse_viewport("1280x720").unwrap(), Viewport::new(1280.0, 720.0));
        assert_eq!(parse_viewport("390X844").unwrap(), Viewport::new(390.0, 844.0));
        assert!(parse_viewport("1280").is_err());
        assert!(parse_viewport("0x720").is_err());
        assert!(parse_viewport("wide x tall").is_err());
    }

    #[test]
    fn test_load_config_clamps() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        fs::write(&path, r#"{ "maxPatternsPerDomain": 0, "learningEnabled": false }"#).unwrap();

        let config = load_config(path.to_str()).unwrap();
        assert_eq!(config.max_patterns_per_domain, 1);
        assert!(!config.learning_enabled);

        fs::write(&path, "{ nope").unwrap();
        assert!(load_config(path.to_str()).is_err());
        assert_eq!(load_config(None).unwrap(), DetectorConfig::default());
    }
}
