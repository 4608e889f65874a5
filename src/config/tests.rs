use super::*;

#[test]
fn defaults_match_documented_values() {
    let settings = Settings::from_raw(RawSettings::default()).expect("valid settings");

    assert_eq!(settings.logging.level, LevelFilter::INFO);
    assert_eq!(settings.dispatch.poll_interval, Duration::from_secs(60));
    assert_eq!(settings.dispatch.delivery_timeout, Duration::from_secs(30));
    assert_eq!(settings.dispatch.max_delivery_retries, 0);
    assert_eq!(settings.store.backend, StoreBackend::Memory);
    assert_eq!(settings.store.delayed_messages_key, "delayed-messages");
    assert_eq!(settings.store.attachment_jobs_key, "attachment-jobs");
    assert_eq!(settings.store.event_index_prefix, "event:");
    assert_eq!(settings.cache.key_prefix, "cache:");
    assert_eq!(settings.cache.default_ttl, Duration::from_secs(600));
    assert!(settings.cache.regions.is_empty());
}

#[test]
fn default_settings_build_the_runtime_defaults() {
    let settings = Settings::from_raw(RawSettings::default()).expect("valid settings");

    assert_eq!(QueueKeys::from(&settings.store), QueueKeys::default());
    assert_eq!(PollerConfig::from(&settings.dispatch), PollerConfig::default());

    let cache = CacheConfig::from(&settings.cache);
    let defaults = CacheConfig::default();
    assert_eq!(cache.key_prefix, defaults.key_prefix);
    assert_eq!(cache.default_ttl, defaults.default_ttl);
}

#[test]
fn cli_overrides_take_highest_precedence() {
    let mut raw = RawSettings::default();
    raw.dispatch.poll_interval_seconds = Some(120);
    raw.logging.level = Some("info".to_string());

    let overrides = ServeOverrides {
        dispatch_poll_interval_seconds: Some(5),
        log_level: Some("debug".to_string()),
        ..Default::default()
    };

    raw.apply_serve_overrides(&overrides);
    let settings = Settings::from_raw(raw).expect("valid settings");

    assert_eq!(settings.dispatch.poll_interval, Duration::from_secs(5));
    assert_eq!(settings.logging.level, LevelFilter::DEBUG);
}

#[test]
fn cli_json_logging_enforces_format() {
    let mut raw = RawSettings::default();
    let overrides = ServeOverrides {
        log_json: Some(true),
        ..Default::default()
    };

    raw.apply_serve_overrides(&overrides);
    let settings = Settings::from_raw(raw).expect("valid settings");

    assert!(matches!(settings.logging.format, LogFormat::Json));
}

#[test]
fn zero_poll_interval_is_rejected() {
    let mut raw = RawSettings::default();
    raw.dispatch.poll_interval_seconds = Some(0);

    let err = Settings::from_raw(raw).expect_err("invalid settings");
    assert!(matches!(
        err,
        LoadError::Invalid {
            key: "dispatch.poll_interval_seconds",
            ..
        }
    ));
    assert_eq!(
        err.to_string(),
        "invalid configuration for `dispatch.poll_interval_seconds`: must be greater than zero"
    );
}

#[test]
fn redis_backend_requires_url() {
    let mut raw = RawSettings::default();
    raw.store.backend = Some("redis".to_string());
    raw.store.redis_url = Some("   ".to_string());

    let err = Settings::from_raw(raw).expect_err("invalid settings");
    assert!(matches!(
        err,
        LoadError::Invalid {
            key: "store.redis_url",
            ..
        }
    ));
}

#[test]
fn unknown_backend_is_rejected() {
    let mut raw = RawSettings::default();
    raw.store.backend = Some("etcd".to_string());

    assert!(Settings::from_raw(raw).is_err());
}

#[test]
fn cache_regions_are_parsed() {
    let mut raw = RawSettings::default();
    raw.cache.regions = vec![
        RawRegionSettings {
            name: "parent".to_string(),
            policy: "Refresh".to_string(),
            ttl_seconds: None,
        },
        RawRegionSettings {
            name: "child".to_string(),
            policy: "evict".to_string(),
            ttl_seconds: Some(90),
        },
    ];

    let settings = Settings::from_raw(raw).expect("valid settings");
    let regions = &settings.cache.regions;

    assert_eq!(regions.len(), 2);
    assert_eq!(regions[0].policy, CachePolicy::Refresh);
    assert_eq!(regions[0].ttl, None);
    assert_eq!(regions[1].policy, CachePolicy::Evict);
    assert_eq!(regions[1].ttl, Some(Duration::from_secs(90)));
}

#[test]
fn duplicate_cache_regions_are_rejected() {
    let mut raw = RawSettings::default();
    let region = RawRegionSettings {
        name: "child".to_string(),
        policy: "evict".to_string(),
        ttl_seconds: None,
    };
    raw.cache.regions = vec![region.clone(), region];

    let err = Settings::from_raw(raw).expect_err("invalid settings");
    assert!(matches!(
        err,
        LoadError::Invalid {
            key: "cache.regions.name",
            ..
        }
    ));
}

#[test]
fn unknown_cache_policy_is_rejected() {
    let mut raw = RawSettings::default();
    raw.cache.regions = vec![RawRegionSettings {
        name: "child".to_string(),
        policy: "write-through".to_string(),
        ttl_seconds: None,
    }];

    let err = Settings::from_raw(raw).expect_err("invalid settings");
    assert!(matches!(
        err,
        LoadError::Invalid {
            key: "cache.regions.policy",
            ..
        }
    ));
}

#[test]
fn region_ttl_falls_back_to_default() {
    let mut raw = RawSettings::default();
    raw.cache.default_ttl_seconds = Some(45);
    raw.cache.regions = vec![RawRegionSettings {
        name: "child".to_string(),
        policy: "evict".to_string(),
        ttl_seconds: None,
    }];

    let settings = Settings::from_raw(raw).expect("valid settings");
    let config = crate::cache::CacheConfig::from(&settings.cache);

    assert_eq!(
        config.region("child").map(|region| region.ttl),
        Some(Duration::from_secs(45))
    );
}

#[test]
fn default_to_serve_command() {
    let args = CliArgs::parse_from(["herald"]);
    let command = args
        .command
        .unwrap_or(Command::Serve(Box::<ServeArgs>::default()));
    assert!(matches!(command, Command::Serve(_)));
}

#[test]
fn parse_serve_arguments() {
    let args = CliArgs::parse_from([
        "herald",
        "--config-file",
        "/etc/herald.toml",
        "serve",
        "--store-backend",
        "redis",
        "--redis-url",
        "redis://localhost:6379",
        "--log-json",
        "yes",
    ]);

    assert_eq!(
        args.config_file.as_deref(),
        Some(std::path::Path::new("/etc/herald.toml"))
    );
    match args.command.expect("serve command") {
        Command::Serve(serve) => {
            assert_eq!(serve.overrides.store_backend.as_deref(), Some("redis"));
            assert_eq!(
                serve.overrides.redis_url.as_deref(),
                Some("redis://localhost:6379")
            );
            assert_eq!(serve.overrides.log_json, Some(true));
        }
    }
}
