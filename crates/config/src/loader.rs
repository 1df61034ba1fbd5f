use crate::config::{Config, default_config_path};
use crate::error::{ErrorKind, Result};
use exn::ResultExt;
use figment::Figment;
use figment::providers::{Env, Format, Json, Serialized, Toml, Yaml};
use std::path::Path;
use tracing::debug;

pub const ENV_PREFIX: &str = "QUARRY_";
/// Separates nested keys in environment variable names:
/// `QUARRY_CACHE__TIME=30` sets `cache.time`.
pub const ENV_SEPARATOR: &str = "__";

impl Config {
    /// Load from the platform configuration file (if any) and the
    /// environment.
    pub fn load() -> Result<Self> {
        match default_config_path() {
            Some(path) => Self::load_from(path),
            None => Self::extract(Self::figment(None)?),
        }
    }

    /// Load from `path` and the environment. A missing file contributes
    /// nothing; the format follows the file extension.
    pub fn load_from(path: impl AsRef<Path>) -> Result<Self> {
        Self::extract(Self::figment(Some(path.as_ref()))?)
    }

    /// The layered sources, lowest priority first: built-in defaults, the
    /// file at `path`, then `QUARRY_*` environment variables.
    pub fn figment(path: Option<&Path>) -> Result<Figment> {
        let mut figment = Figment::new().merge(Serialized::defaults(Config::default()));
        if let Some(path) = path {
            debug!(path = %path.display(), "Reading configuration file");
            let extension = path.extension().and_then(|ext| ext.to_str()).unwrap_or_default();
            figment = match extension.to_ascii_lowercase().as_str() {
                "yaml" | "yml" => figment.merge(Yaml::file(path)),
                "toml" => figment.merge(Toml::file(path)),
                "json" => figment.merge(Json::file(path)),
                _ => exn::bail!(ErrorKind::Invalid(format!(
                    "unsupported configuration file format: {}",
                    path.display()
                ))),
            };
        }
        Ok(figment.merge(Env::prefixed(ENV_PREFIX).split(ENV_SEPARATOR)))
    }

    fn extract(figment: Figment) -> Result<Self> {
        let config: Config = figment.extract().or_raise(|| ErrorKind::Load)?;
        config.validate()?;
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::CacheStoreKind;
    use figment::Jail;
    use quarry_cache::ReadMethod;
    use std::path::PathBuf;
    use std::time::Duration;

    fn load(path: &str) -> std::result::Result<Config, figment::Error> {
        Config::load_from(path).map_err(|err| err.to_string().into())
    }

    #[test]
    fn test_missing_file_gives_defaults() {
        Jail::expect_with(|_jail| {
            assert_eq!(load("absent.toml")?, Config::default());
            Ok(())
        });
    }

    #[test]
    fn test_yaml_file() {
        Jail::expect_with(|jail| {
            jail.create_file(
                "quarry.yaml",
                r#"
cache:
  store: file
  path: /var/cache/quarry
  time: 30
  time_for_method:
    count: 60
  except: [paginate, simplePaginate]
pagination:
  per_page: 20
"#,
            )?;
            let config = load("quarry.yaml")?;
            assert_eq!(config.cache.store, CacheStoreKind::File);
            assert_eq!(config.cache.path, Some(PathBuf::from("/var/cache/quarry")));
            assert_eq!(config.pagination.per_page, 20);
            assert_eq!(config.pagination.max_per_page, 150);
            let policy = config.cache_policy().unwrap();
            assert_eq!(policy.ttl_for(ReadMethod::Count), Some(Duration::from_secs(60)));
            assert!(!policy.allows(ReadMethod::SimplePaginate));
            Ok(())
        });
    }

    #[test]
    fn test_toml_and_json_files() {
        Jail::expect_with(|jail| {
            jail.create_file("quarry.toml", "[cache]\noff = true\nonly = [\"get\", \"find\"]\n")?;
            jail.create_file("quarry.json", r#"{"pagination": {"max_per_page": 40}}"#)?;
            let toml = load("quarry.toml")?;
            assert!(toml.cache.off);
            assert_eq!(toml.cache.only, vec!["get".to_string(), "find".to_string()]);
            assert_eq!(load("quarry.json")?.pagination.max_per_page, 40);
            Ok(())
        });
    }

    #[test]
    fn test_environment_overrides_file() {
        Jail::expect_with(|jail| {
            jail.create_file("quarry.toml", "[cache]\ntime = 30\nstore = \"memory\"\n")?;
            jail.set_env("QUARRY_CACHE__TIME", "90");
            jail.set_env("QUARRY_CACHE__STORE", "none");
            jail.set_env("QUARRY_PAGINATION__MAX_PER_PAGE", "50");
            let config = load("quarry.toml")?;
            assert_eq!(config.cache.time, 90);
            assert_eq!(config.cache.store, CacheStoreKind::None);
            assert_eq!(config.pagination.max_per_page, 50);
            Ok(())
        });
    }

    #[test]
    fn test_invalid_values_are_rejected() {
        Jail::expect_with(|jail| {
            jail.create_file("quarry.toml", "[pagination]\nper_page = 500\n")?;
            let err = Config::load_from("quarry.toml").unwrap_err();
            assert!(matches!(&*err, ErrorKind::Invalid(_)));

            jail.create_file("broken.toml", "[cache\ntime = ")?;
            let err = Config::load_from("broken.toml").unwrap_err();
            assert_eq!(*err, ErrorKind::Load);

            jail.create_file("wrong-type.yaml", "cache:\n  time: soon\n")?;
            let err = Config::load_from("wrong-type.yaml").unwrap_err();
            assert_eq!(*err, ErrorKind::Load);
            Ok(())
        });
    }

    #[test]
    fn test_unsupported_extension() {
        let err = Config::load_from("quarry.ini").unwrap_err();
        assert!(matches!(&*err, ErrorKind::Invalid(message) if message.contains("quarry.ini")));
    }
}
