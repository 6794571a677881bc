//! Configuration loading and types

use std::path::{Path, PathBuf};

use cloudbook_core::{CollectionConfig, TargetConfig, parse_account_list, parse_region_list};
use eyre::WrapErr;
use serde::{Deserialize, Serialize};

/// Top-level configuration for cloudbook
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Accounts, regions and how to reach them
    #[serde(default)]
    pub targets: TargetsConfig,
    /// Collection tuning
    #[serde(default)]
    pub collection: CollectionConfig,
    /// Where and how the report is written
    #[serde(default)]
    pub output: OutputConfig,
}

/// `[targets]` section
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TargetsConfig {
    /// Newline-delimited account list, merged with the inline accounts
    #[serde(default)]
    pub accounts_file: Option<PathBuf>,
    /// Inline targets
    #[serde(flatten)]
    pub target: TargetConfig,
}

/// `[output]` section
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutputConfig {
    /// Directory the report is written to
    #[serde(default = "default_directory")]
    pub directory: PathBuf,
    /// File name prefix
    #[serde(default = "default_prefix")]
    pub prefix: String,
    /// Also convert the markdown to a word-processor document
    #[serde(default)]
    pub convert: bool,
    /// Document converter program
    #[serde(default = "default_converter")]
    pub converter: String,
    /// Maximum rows per table (0 = unlimited)
    #[serde(default)]
    pub max_rows: usize,
    /// Exit non-zero when any result set is not `Ok`
    #[serde(default)]
    pub fail_on_partial: bool,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            directory: default_directory(),
            prefix: default_prefix(),
            convert: false,
            converter: default_converter(),
            max_rows: 0,
            fail_on_partial: false,
        }
    }
}

fn default_directory() -> PathBuf {
    PathBuf::from(".")
}

fn default_prefix() -> String {
    "cloud_inventory".to_string()
}

fn default_converter() -> String {
    "pandoc".to_string()
}

impl OutputConfig {
    /// Row limit, if any
    #[must_use]
    pub fn max_rows(&self) -> Option<usize> {
        (self.max_rows > 0).then_some(self.max_rows)
    }
}

impl Config {
    /// Load configuration from file
    ///
    /// # Errors
    /// Returns error if file cannot be read or parsed
    pub fn load(path: &Path) -> eyre::Result<Self> {
        let content = std::fs::read_to_string(path)
            .wrap_err_with(|| format!("failed to read config {}", path.display()))?;
        let config: Config = toml::from_str(&content)
            .wrap_err_with(|| format!("failed to parse config {}", path.display()))?;
        Ok(config)
    }

    /// Load from an explicit path, the default paths, or use defaults
    ///
    /// Environment overrides are applied on top.
    ///
    /// # Errors
    /// Returns error if a config file exists but is invalid, or an override
    /// cannot be parsed
    pub fn load_default(explicit: Option<&Path>) -> eyre::Result<Self> {
        let mut config = match explicit {
            Some(path) => Self::load(path)?,
            None => Self::discover()?,
        };
        config.apply_env(|key| std::env::var(key).ok())?;
        Ok(config)
    }

    fn discover() -> eyre::Result<Self> {
        if let Ok(path) = std::env::var("CLOUDBOOK_CONFIG") {
            return Self::load(Path::new(&path));
        }

        let paths = [
            Some(PathBuf::from("cloudbook.toml")),
            dirs::config_dir().map(|p| p.join("cloudbook/cloudbook.toml")),
        ];

        for path in paths.into_iter().flatten() {
            if path.exists() {
                tracing::debug!(path = %path.display(), "loading config");
                return Self::load(&path);
            }
        }

        tracing::debug!("no config file found, using defaults");
        Ok(Config::default())
    }

    /// Apply `CLOUDBOOK_*` overrides read through `lookup`
    ///
    /// # Errors
    /// Returns error if `CLOUDBOOK_WORKERS` is not a number
    pub fn apply_env<F>(&mut self, lookup: F) -> eyre::Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(path) = lookup("CLOUDBOOK_ACCOUNTS_FILE") {
            self.targets.accounts_file = Some(PathBuf::from(path));
        }
        if let Some(regions) = lookup("CLOUDBOOK_REGIONS") {
            self.targets.target.regions = parse_region_list(&regions);
        }
        if let Some(role_name) = lookup("CLOUDBOOK_ROLE_NAME") {
            self.targets.target.role_name = role_name;
        }
        if let Some(external_id) = lookup("CLOUDBOOK_EXTERNAL_ID") {
            self.targets.target.external_id = Some(external_id).filter(|id| !id.is_empty());
        }
        if let Some(workers) = lookup("CLOUDBOOK_WORKERS") {
            self.collection.workers = workers
                .trim()
                .parse()
                .wrap_err_with(|| format!("CLOUDBOOK_WORKERS is not a number: `{workers}`"))?;
        }
        Ok(())
    }

    /// Final target set: inline accounts followed by the accounts file
    ///
    /// # Errors
    /// Returns error if the accounts file cannot be read
    pub fn resolve_targets(&self) -> eyre::Result<TargetConfig> {
        let mut target = self.targets.target.clone();

        if let Some(path) = &self.targets.accounts_file {
            let content = std::fs::read_to_string(path)
                .wrap_err_with(|| format!("failed to read accounts file {}", path.display()))?;
            target.accounts.extend(parse_account_list(&content));
        }

        Ok(target.normalized())
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;
    use std::io::Write;

    use super::*;

    #[test]
    fn test_defaults() {
        let config: Config = toml::from_str("").unwrap();

        assert_eq!(config.targets.target.role_name, "CloudbookInventoryRole");
        assert_eq!(config.targets.target.partition, "aws");
        assert_eq!(config.collection.workers, 8);
        assert_eq!(config.output.prefix, "cloud_inventory");
        assert_eq!(config.output.converter, "pandoc");
        assert_eq!(config.output.max_rows(), None);
    }

    #[test]
    fn test_full_file() {
        let config: Config = toml::from_str(
            r#"
            [targets]
            accounts = ["111111111111"]
            regions = ["us-east-1", "eu-west-1"]
            role_name = "AuditRole"
            external_id = "secret"

            [targets.role_arns]
            "111111111111" = "arn:aws:iam::111111111111:role/Custom"

            [collection]
            workers = 2
            kinds = ["vpcs"]

            [output]
            directory = "reports"
            convert = true
            max_rows = 50
            fail_on_partial = true
            "#,
        )
        .unwrap();

        let target = &config.targets.target;
        assert_eq!(target.regions, ["us-east-1", "eu-west-1"]);
        assert_eq!(target.external_id.as_deref(), Some("secret"));
        assert_eq!(
            target.role_arn_for("111111111111"),
            "arn:aws:iam::111111111111:role/Custom"
        );
        assert_eq!(config.collection.workers, 2);
        assert_eq!(config.collection.kinds, ["vpcs"]);
        assert_eq!(config.output.directory, PathBuf::from("reports"));
        assert_eq!(config.output.max_rows(), Some(50));
        assert!(config.output.fail_on_partial);
    }

    #[test]
    fn test_env_overrides() {
        let env = HashMap::from([
            ("CLOUDBOOK_REGIONS", "us-east-1, us-west-2,us-east-1"),
            ("CLOUDBOOK_ROLE_NAME", "OtherRole"),
            ("CLOUDBOOK_EXTERNAL_ID", ""),
            ("CLOUDBOOK_WORKERS", "3"),
        ]);
        let mut config = Config::default();
        config.targets.target.external_id = Some("old".to_string());

        config
            .apply_env(|key| env.get(key).map(ToString::to_string))
            .unwrap();

        assert_eq!(config.targets.target.regions, ["us-east-1", "us-west-2"]);
        assert_eq!(config.targets.target.role_name, "OtherRole");
        assert_eq!(config.targets.target.external_id, None);
        assert_eq!(config.collection.workers, 3);
    }

    #[test]
    fn test_bad_worker_override() {
        let mut config = Config::default();
        let result =
            config.apply_env(|key| (key == "CLOUDBOOK_WORKERS").then(|| "many".to_string()));
        assert!(result.is_err());
    }

    #[test]
    fn test_resolve_targets_merges_accounts_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "# production").unwrap();
        writeln!(file, "222222222222").unwrap();
        writeln!(file).unwrap();
        writeln!(file, "  111111111111  ").unwrap();

        let mut config = Config::default();
        config.targets.target.accounts = vec!["111111111111".to_string()];
        config.targets.accounts_file = Some(file.path().to_path_buf());

        let target = config.resolve_targets().unwrap();
        assert_eq!(target.accounts, ["111111111111", "222222222222"]);
    }

    #[test]
    fn test_missing_accounts_file() {
        let mut config = Config::default();
        config.targets.accounts_file = Some(PathBuf::from("/nonexistent/accounts.txt"));
        assert!(config.resolve_targets().is_err());
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cloudbook.toml");
        std::fs::write(&path, "[collection]\nworkers = 4\n").unwrap();

        let config = Config::load(&path).unwrap();
        assert_eq!(config.collection.workers, 4);

        std::fs::write(&path, "[collection\n").unwrap();
        assert!(Config::load(&path).is_err());
    }
}
