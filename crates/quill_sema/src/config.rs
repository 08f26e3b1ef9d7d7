use std::path::Path;

use serde::Deserialize;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to parse {path}: {message}")]
    Parse { path: String, message: String },
    #[error("invalid value for {key}: {value}")]
    Env { key: &'static str, value: String },
}

/// Tuning knobs for one `check_program` run. Read from a `[sema]` table of a
/// `quill.toml`, or from the environment.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct SemaConfig {
    #[serde(default = "default_max_instantiation_depth")]
    pub max_instantiation_depth: usize,
    #[serde(default = "default_allow_coercions")]
    pub allow_coercions: bool,
    /// How many candidate signatures an overload error lists.
    #[serde(default = "default_max_listed_candidates")]
    pub max_listed_candidates: usize,
}

impl Default for SemaConfig {
    fn default() -> Self {
        Self {
            max_instantiation_depth: default_max_instantiation_depth(),
            allow_coercions: default_allow_coercions(),
            max_listed_candidates: default_max_listed_candidates(),
        }
    }
}

fn default_max_instantiation_depth() -> usize {
    64
}

fn default_allow_coercions() -> bool {
    true
}

fn default_max_listed_candidates() -> usize {
    8
}

#[derive(Debug, Deserialize)]
struct QuillToml {
    #[serde(default)]
    sema: Option<SemaConfig>,
}

impl SemaConfig {
    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        Self::parse(text, "<inline>")
    }

    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path)?;
        Self::parse(&text, &path.display().to_string())
    }

    fn parse(text: &str, path: &str) -> Result<Self, ConfigError> {
        let file: QuillToml = toml::from_str(text).map_err(|err| ConfigError::Parse {
            path: path.to_string(),
            message: err.to_string(),
        })?;
        Ok(file.sema.unwrap_or_default())
    }

    /// Defaults overridden by `QUILL_MAX_INSTANTIATION_DEPTH` and
    /// `QUILL_NO_COERCIONS=1`.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::default().with_env_overrides(|key| std::env::var(key).ok())
    }

    fn with_env_overrides(
        mut self,
        var: impl Fn(&'static str) -> Option<String>,
    ) -> Result<Self, ConfigError> {
        const DEPTH: &str = "QUILL_MAX_INSTANTIATION_DEPTH";
        const NO_COERCIONS: &str = "QUILL_NO_COERCIONS";
        if let Some(value) = var(DEPTH) {
            self.max_instantiation_depth = value
                .trim()
                .parse()
                .map_err(|_| ConfigError::Env { key: DEPTH, value })?;
        }
        if let Some(value) = var(NO_COERCIONS) {
            if value == "1" || value.eq_ignore_ascii_case("true") {
                self.allow_coercions = false;
            }
        }
        Ok(self)
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use super::*;

    #[test]
    fn missing_table_and_missing_keys_use_defaults() {
        assert_eq!(SemaConfig::from_toml_str("").expect("empty"), SemaConfig::default());
        let config =
            SemaConfig::from_toml_str("[sema]\nallow_coercions = false\n").expect("parses");
        assert!(!config.allow_coercions);
        assert_eq!(config.max_instantiation_depth, 64);
    }

    #[test]
    fn loads_from_a_file() {
        let mut file = tempfile::NamedTempFile::new().expect("temp file");
        writeln!(
            file,
            "[sema]\nmax_instantiation_depth = 5\nmax_listed_candidates = 2"
        )
        .expect("write");
        let config = SemaConfig::load(file.path()).expect("loads");
        assert_eq!(config.max_instantiation_depth, 5);
        assert_eq!(config.max_listed_candidates, 2);
    }

    #[test]
    fn parse_errors_name_the_file() {
        let dir = tempfile::tempdir().expect("temp dir");
        let path = dir.path().join("quill.toml");
        std::fs::write(&path, "[sema]\nmax_instantiation_depth = \"deep\"\n").expect("write");
        let err = SemaConfig::load(&path).expect_err("bad value");
        assert!(err.to_string().contains("quill.toml"));
    }

    #[test]
    fn environment_overrides_defaults() {
        let config = SemaConfig::default()
            .with_env_overrides(|key| match key {
                "QUILL_MAX_INSTANTIATION_DEPTH" => Some("12".to_string()),
                "QUILL_NO_COERCIONS" => Some("true".to_string()),
                _ => None,
            })
            .expect("valid overrides");
        assert_eq!(config.max_instantiation_depth, 12);
        assert!(!config.allow_coercions);

        let err = SemaConfig::default()
            .with_env_overrides(|key| {
                (key == "QUILL_MAX_INSTANTIATION_DEPTH").then(|| "lots".to_string())
            })
            .expect_err("not a number");
        assert!(matches!(err, ConfigError::Env { .. }));
    }
}
