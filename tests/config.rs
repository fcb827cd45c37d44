#[cfg(test)]
mod tests {
    use parking_lot::{Mutex, MutexGuard};
    use std::time::Duration;
    use tasklane::api::{DisplayPreferences, StaticPreferences};
    use tasklane::libs::config::{Config, DisplayConfig, RemoteConfig, SyncConfig, CONFIG_FILE_NAME};
    use tasklane::libs::data_storage::DataStorage;
    use tasklane::libs::section::SectionId;
    use tasklane::libs::store::StoreOptions;
    use tempfile::TempDir;
    use test_context::{test_context, TestContext};

    // HOME is process-wide; tests in this file take turns with it.
    static HOME_LOCK: Mutex<()> = Mutex::new(());

    /// Points the data directory at a fresh temporary home for each test.
    struct ConfigTestContext {
        _home: MutexGuard<'static, ()>,
        _temp_dir: TempDir,
        api_url: String,
        api_key: String,
    }

    impl TestContext for ConfigTestContext {
        fn setup() -> Self {
            let home = HOME_LOCK.lock();
            let temp_dir = tempfile::tempdir().unwrap();
            std::env::set_var("HOME", temp_dir.path());
            std::env::set_var("LOCALAPPDATA", temp_dir.path());
            ConfigTestContext {
                _home: home,
                _temp_dir: temp_dir,
                api_url: "https://tasks.example.com".to_string(),
                api_key: "anon-key".to_string(),
            }
        }
    }

    #[test_context(ConfigTestContext)]
    #[test]
    fn test_default_config(_ctx: &mut ConfigTestContext) {
        let config = Config::default();
        assert_eq!(config.user_id, "local");
        assert_eq!(config.sync, SyncConfig::default());
        assert_eq!(config.sync.persist_timeout(), Duration::from_millis(8000));
        assert_eq!(config.sync.reorder_debounce(), Duration::from_millis(100));
        assert!(config.sync.retry_once);
        assert_eq!(config.drag.activation_delay_ms, 250);
        assert!(config.remote.is_none());
        assert!(config.display.is_none());
    }

    #[test_context(ConfigTestContext)]
    #[test]
    fn test_read_nonexistent_config(_ctx: &mut ConfigTestContext) {
        let config = Config::read().unwrap();
        assert_eq!(config, Config::default());
    }

    #[test_context(ConfigTestContext)]
    #[test]
    fn test_save_and_read_config(ctx: &mut ConfigTestContext) {
        let config = Config {
            user_id: "alice".to_string(),
            sync: SyncConfig {
                persist_timeout_ms: 3000,
                retry_once: false,
                ..SyncConfig::default()
            },
            remote: Some(RemoteConfig {
                api_url: ctx.api_url.clone(),
                api_key: ctx.api_key.clone(),
                table: "tasks".to_string(),
            }),
            display: Some(DisplayConfig {
                order: vec![SectionId::Urgent, SectionId::BigThree],
                hidden: vec![SectionId::Completed],
            }),
            ..Config::default()
        };
        config.save().unwrap();

        let read = Config::read().unwrap();
        assert_eq!(read, config);
    }

    #[test_context(ConfigTestContext)]
    #[test]
    fn test_partial_file_falls_back_to_defaults(_ctx: &mut ConfigTestContext) {
        let path = DataStorage::new().get_path(CONFIG_FILE_NAME).unwrap();
        std::fs::write(
            &path,
            r#"{ "sync": { "reorder_debounce_ms": 250 }, "display": { "hidden": ["done", "custom-someday"] } }"#,
        )
        .unwrap();

        let config = Config::read().unwrap();
        assert_eq!(config.user_id, "local");
        assert_eq!(config.sync.reorder_debounce_ms, 250);
        assert_eq!(config.sync.persist_timeout_ms, 8000);
        let display = config.display.unwrap();
        assert_eq!(display.hidden, vec![SectionId::Completed, SectionId::Custom("someday".into())]);
        assert!(display.order.is_empty());
    }

    #[test_context(ConfigTestContext)]
    #[test]
    fn test_unknown_section_is_an_error(_ctx: &mut ConfigTestContext) {
        let path = DataStorage::new().get_path(CONFIG_FILE_NAME).unwrap();
        std::fs::write(&path, r#"{ "display": { "order": ["someday"] } }"#).unwrap();

        assert!(Config::read().is_err());
    }

    #[test_context(ConfigTestContext)]
    #[test]
    fn test_delete_config(_ctx: &mut ConfigTestContext) {
        assert!(!Config::delete().unwrap());

        Config::default().save().unwrap();
        assert!(Config::delete().unwrap());
        assert!(!DataStorage::new().get_path(CONFIG_FILE_NAME).unwrap().exists());
    }

    #[test_context(ConfigTestContext)]
    #[test]
    fn test_store_options_from_config(_ctx: &mut ConfigTestContext) {
        let mut config = Config::default();
        config.user_id = "bob".to_string();
        config.sync.just_changed_ms = 900;
        config.sync.retry_once = false;

        let options = StoreOptions::from(&config);
        assert_eq!(options.user_id, "bob");
        assert_eq!(options.just_changed, Duration::from_millis(900));
        assert_eq!(options.persist_timeout, Duration::from_millis(8000));
        assert!(!options.retry_once);
    }

    #[test_context(ConfigTestContext)]
    #[test]
    fn test_display_preferences_from_config(_ctx: &mut ConfigTestContext) {
        let display = DisplayConfig {
            order: vec![SectionId::Waiting],
            hidden: vec![SectionId::Weekly],
        };
        let preferences = StaticPreferences::from(&display);
        assert_eq!(preferences.section_order(), vec![SectionId::Waiting]);
        assert!(!preferences.is_visible(&SectionId::Weekly));
        assert!(preferences.is_visible(&SectionId::Routine));
    }
}
