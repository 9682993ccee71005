use std::env;
use std::fs;
use std::time::Duration;

use resilient_move::config::{
    CONFIG_ENV, LoadResult, default_config_path, default_log_path, default_store_path,
    load_or_init,
};
use serial_test::serial;

struct EnvGuard;

impl EnvGuard {
    fn set(value: &std::path::Path) -> Self {
        unsafe {
            env::set_var(CONFIG_ENV, value);
        }
        EnvGuard
    }
}

impl Drop for EnvGuard {
    fn drop(&mut self) {
        unsafe {
            env::remove_var(CONFIG_ENV);
        }
    }
}

#[test]
#[serial]
fn env_file_colocates_log_and_state() {
    let td = tempfile::tempdir().unwrap();
    let cfg = td.path().join("worker.xml");
    let _env = EnvGuard::set(&cfg);

    assert_eq!(default_config_path().unwrap(), cfg);
    assert_eq!(default_log_path().unwrap(), td.path().join("resilient_move.log"));
    assert_eq!(default_store_path().unwrap(), td.path().join("breaker_state.json"));
}

#[test]
#[serial]
fn env_directory_means_config_xml_inside() {
    let td = tempfile::tempdir().unwrap();
    let _env = EnvGuard::set(td.path());

    assert_eq!(default_config_path().unwrap(), td.path().join("config.xml"));
}

#[test]
#[serial]
fn missing_env_file_is_an_error_and_nothing_is_created() {
    let td = tempfile::tempdir().unwrap();
    let cfg = td.path().join("absent.xml");
    let _env = EnvGuard::set(&cfg);

    let err = load_or_init().unwrap_err();
    assert!(err.to_string().contains(CONFIG_ENV));
    assert!(!cfg.exists());
}

#[test]
#[serial]
fn loads_env_named_config() {
    let td = tempfile::tempdir().unwrap();
    let cfg_path = td.path().join("config.xml");
    fs::write(
        &cfg_path,
        format!(
            "<config>
               <disk_root>{}</disk_root>
               <breaker_name>nas-1</breaker_name>
               <failure_threshold>2</failure_threshold>
               <recovery_timeout_seconds>10</recovery_timeout_seconds>
               <max_attempts>4</max_attempts>
               <log_file></log_file>
             </config>",
            td.path().display()
        ),
    )
    .unwrap();
    let _env = EnvGuard::set(&cfg_path);

    match load_or_init().unwrap() {
        LoadResult::Loaded(cfg, path) => {
            assert_eq!(path, cfg_path);
            assert_eq!(cfg.disk_root, td.path());
            assert_eq!(cfg.breaker_name, "nas-1");
            assert_eq!(cfg.failure_threshold, 2);
            assert_eq!(cfg.recovery_timeout, Duration::from_secs(10));
            assert_eq!(cfg.max_attempts, 4);
            assert_eq!(cfg.store_path, td.path().join("breaker_state.json"));
            cfg.validate().unwrap();
        }
        other => panic!("unexpected: {other:?}"),
    }
}

#[test]
#[serial]
fn unknown_element_is_rejected() {
    let td = tempfile::tempdir().unwrap();
    let cfg_path = td.path().join("config.xml");
    fs::write(&cfg_path, "<config><failure_treshold>2</failure_treshold></config>").unwrap();
    let _env = EnvGuard::set(&cfg_path);

    assert!(load_or_init().is_err());
}
