use anyhow::Context;
use serde::Deserialize;
use std::path::{Path, PathBuf};

/// Daemon configuration, read from an optional TOML file. Every section and
/// key is optional; command-line flags are applied on top afterwards.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct DaemonConfig {
    pub seed_path: Option<PathBuf>,
    pub simulate_latency: bool,
    pub log: LogConfig,
    pub store: StoreSettings,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct LogConfig {
    pub level: String,
    pub json: bool,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: "warn".to_string(),
            json: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct StoreSettings {
    /// Category weight given to assignments created without one.
    pub default_assignment_weight: f64,
    /// Attendance rate reported for a scope with no records, per student and
    /// in aggregate alike.
    pub empty_attendance_rate: u32,
}

impl Default for StoreSettings {
    fn default() -> Self {
        Self {
            default_assignment_weight: 0.2,
            empty_attendance_rate: 100,
        }
    }
}

impl DaemonConfig {
    pub fn load(path: Option<&Path>) -> anyhow::Result<Self> {
        let Some(path) = path else {
            return Ok(Self::default());
        };
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("read config {}", path.display()))?;
        let mut cfg = Self::from_toml(&text)
            .with_context(|| format!("parse config {}", path.display()))?;

        // Relative seed paths are resolved against the config file's folder.
        if let (Some(seed), Some(dir)) = (cfg.seed_path.as_ref(), path.parent()) {
            if seed.is_relative() {
                cfg.seed_path = Some(dir.join(seed));
            }
        }
        Ok(cfg)
    }

    pub fn from_toml(text: &str) -> anyhow::Result<Self> {
        let cfg: DaemonConfig = toml::from_str(text)?;
        cfg.validate()?;
        Ok(cfg)
    }

    fn validate(&self) -> anyhow::Result<()> {
        let w = self.store.default_assignment_weight;
        if !w.is_finite() || w < 0.0 {
            anyhow::bail!("store.default_assignment_weight must be a non-negative number");
        }
        if self.store.empty_attendance_rate > 100 {
            anyhow::bail!("store.empty_attendance_rate must be between 0 and 100");
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn missing_file_path_gives_defaults() {
        let cfg = DaemonConfig::load(None).expect("defaults");
        assert_eq!(cfg, DaemonConfig::default());
        assert_eq!(cfg.store.default_assignment_weight, 0.2);
        assert_eq!(cfg.store.empty_attendance_rate, 100);
        assert_eq!(cfg.log.level, "warn");
    }

    #[test]
    fn partial_file_keeps_other_defaults() {
        let cfg = DaemonConfig::from_toml(
            r#"
            simulate_latency = true
            [store]
            empty_attendance_rate = 0
            "#,
        )
        .expect("parse");
        assert!(cfg.simulate_latency);
        assert_eq!(cfg.store.empty_attendance_rate, 0);
        assert_eq!(cfg.store.default_assignment_weight, 0.2);
        assert!(!cfg.log.json);
    }

    #[test]
    fn rejects_out_of_range_values_and_unknown_keys() {
        assert!(DaemonConfig::from_toml("[store]\nempty_attendance_rate = 150\n").is_err());
        assert!(DaemonConfig::from_toml("[store]\ndefault_assignment_weight = -1.0\n").is_err());
        assert!(DaemonConfig::from_toml("colour = \"blue\"\n").is_err());
    }

    #[test]
    fn relative_seed_path_resolves_next_to_config() {
        let dir = tempfile::tempdir().expect("tempdir");
        let cfg_path = dir.path().join("schoold.toml");
        let mut f = std::fs::File::create(&cfg_path).expect("create");
        writeln!(f, "seed_path = \"seed/demo.json\"\n[log]\nlevel = \"debug\"").expect("write");
        drop(f);

        let cfg = DaemonConfig::load(Some(&cfg_path)).expect("load");
        assert_eq!(cfg.seed_path, Some(dir.path().join("seed/demo.json")));
        assert_eq!(cfg.log.level, "debug");
    }
}
