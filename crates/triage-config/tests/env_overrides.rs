use std::path::Path;

use figment::Jail;
use triage_config::TriageConfig;

#[test]
fn env_overrides_nested_values() {
    Jail::expect_with(|jail| {
        jail.set_env("TRIAGE_STORE__PENDING_TTL_SECS", "90");
        jail.set_env("TRIAGE_DISPATCH__ORACLE_TIMEOUT_MS", "250");

        let config = TriageConfig::load_from(Path::new(".")).expect("config loads");
        assert_eq!(config.store.pending_ttl_secs, 90);
        assert_eq!(config.dispatch.oracle_timeout().as_millis(), 250);
        Ok(())
    });
}

#[test]
fn env_beats_project_toml() {
    Jail::expect_with(|jail| {
        std::fs::create_dir_all(jail.directory().join(".triage")).expect("create .triage");
        jail.create_file(
            ".triage/config.toml",
            r#"
            [store]
            path = "from-toml.db"
            "#,
        )?;
        jail.set_env("TRIAGE_STORE__PATH", "from-env.db");

        let config = TriageConfig::load_from(Path::new(".")).expect("config loads");
        assert_eq!(config.store.path, "from-env.db");
        Ok(())
    });
}

#[test]
fn load_from_reads_given_root() {
    Jail::expect_with(|jail| {
        let root = jail.directory().join("service");
        std::fs::create_dir_all(root.join(".triage")).expect("create .triage");
        std::fs::write(
            root.join(".triage/config.toml"),
            "[models]\nenabled = [\"needsdiagnosis\"]\n",
        )
        .expect("write config");

        let config = TriageConfig::load_from(&root).expect("config loads");
        let registry = config.models.registry();
        assert_eq!(registry.len(), 1);
        assert!(registry.contains("needsdiagnosis"));
        Ok(())
    });
}
