use std::path::Path;

use crate::spec::Spec;

/// Prefix for environment variable configuration overrides.
const ENV_PREFIX: &str = "MIRROR";

/// Separator between the environment variable prefix and key segments.
const ENV_PREFIX_SEPARATOR: &str = "_";

/// Separator for nested configuration keys in environment variables.
///
/// Example: `MIRROR_MATCHERS__ACTIVE` sets the `matchers.active` field.
const ENV_SEPARATOR: &str = "__";

/// Loads a dump specification from a YAML file with environment overrides.
///
/// Values from the file are merged with environment variables prefixed with
/// `MIRROR`, nested keys separated by double underscores.
pub fn load_spec(path: &Path) -> Result<Spec, config::ConfigError> {
    let settings = config::Config::builder()
        .add_source(config::File::from(path.to_path_buf()))
        .add_source(
            config::Environment::with_prefix(ENV_PREFIX)
                .prefix_separator(ENV_PREFIX_SEPARATOR)
                .separator(ENV_SEPARATOR),
        )
        .build()?;

    settings.try_deserialize::<Spec>()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_load_spec_missing_file() {
        let result = load_spec(Path::new("/nonexistent/mirror.yaml"));
        assert!(result.is_err());
    }

    #[test]
    fn test_load_spec_from_file() {
        let dir = std::env::temp_dir().join("mirror-config-load-test");
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("spec.yaml");
        std::fs::write(
            &path,
            r#"
tables:
  - name: users
    anonymise:
      email: EmailAddress
views:
  totals: 1
matchers:
  active: "deleted_at IS NULL"
"#,
        )
        .unwrap();

        let spec = load_spec(&path).unwrap();
        assert_eq!(spec.tables.len(), 1);
        assert_eq!(spec.tables[0].anonymise["email"], "EmailAddress");
        assert_eq!(spec.views["totals"], 1);
        assert_eq!(spec.matchers["active"], "deleted_at IS NULL");
    }
}
