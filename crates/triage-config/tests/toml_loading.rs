use std::path::Path;

use figment::Jail;
use pretty_assertions::assert_eq;
use triage_config::{ConfigError, TriageConfig};

fn write_project_config(jail: &mut Jail, contents: &str) -> figment::error::Result<()> {
    std::fs::create_dir_all(jail.directory().join(".triage")).expect("create .triage");
    jail.create_file(".triage/config.toml", contents)?;
    Ok(())
}

#[test]
fn project_toml_overrides_defaults() {
    Jail::expect_with(|jail| {
        write_project_config(
            jail,
            r#"
            [models]
            enabled = ["component", "regression"]

            [store]
            path = ":memory:"
            pending_ttl_secs = 600
            "#,
        )?;

        let config = TriageConfig::load_from(Path::new(".")).expect("config loads");
        assert_eq!(config.models.enabled, vec!["component", "regression"]);
        assert!(config.store.is_in_memory());
        assert_eq!(config.store.pending_ttl_secs, 600);
        // Untouched fields keep their defaults.
        assert_eq!(config.store.result_ttl_secs, 604_800);
        assert_eq!(config.dispatch.oracle_timeout_ms, 10_000);
        Ok(())
    });
}

#[test]
fn missing_project_file_uses_defaults() {
    Jail::expect_with(|_jail| {
        let config = TriageConfig::load_from(Path::new(".")).expect("config loads");
        assert!(config.models.registry().contains("spambug"));
        assert_eq!(config.store.path, ".triage/triage.db");
        Ok(())
    });
}

#[test]
fn invalid_values_fail_validation() {
    Jail::expect_with(|jail| {
        write_project_config(
            jail,
            r"
            [dispatch]
            store_timeout_ms = 0
            ",
        )?;

        let err = TriageConfig::load_from(Path::new(".")).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue { ref field, .. } if field == "dispatch.store_timeout_ms"));
        Ok(())
    });
}

#[test]
fn malformed_toml_is_a_figment_error() {
    Jail::expect_with(|jail| {
        write_project_config(jail, "[store\npath = ")?;
        let err = TriageConfig::load_from(Path::new(".")).unwrap_err();
        assert!(matches!(err, ConfigError::Figment(_)));
        Ok(())
    });
}
