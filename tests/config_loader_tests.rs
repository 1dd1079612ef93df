use enterprise_api::config::{ConfigError, ConfigLoader};
use std::{
    env, fs,
    path::PathBuf,
    sync::{Mutex, MutexGuard, OnceLock},
};
use tempfile::TempDir;

const VARS: &[&str] = &[
    "ENTERPRISE_PROFILE",
    "ENTERPRISE_API_BIND_ADDR",
    "ENTERPRISE_LOG_LEVEL",
    "ENTERPRISE_JWT_SECRET_KEY",
    "ENTERPRISE_COURSE_CATALOG_API_URL",
    "ENTERPRISE_LMS_ROOT_URL",
    "ENTERPRISE_THROTTLE_USER_RATE",
    "ENTERPRISE_PAGE_SIZE",
];

fn env_lock() -> &'static Mutex<()> {
    static LOCK: OnceLock<Mutex<()>> = OnceLock::new();
    LOCK.get_or_init(|| Mutex::new(()))
}

fn env_guard() -> MutexGuard<'static, ()> {
    env_lock()
        .lock()
        .unwrap_or_else(|poison| poison.into_inner())
}

fn clear_env() {
    unsafe {
        for var in VARS {
            env::remove_var(var);
        }
    }
}

fn write_env_file(dir: &TempDir, name: &str, contents: &str) {
    let path = dir.path().join(name);
    fs::write(path, contents).unwrap();
}

fn empty_dir_loader() -> (TempDir, ConfigLoader) {
    let temp_dir = TempDir::new().unwrap();
    let loader = ConfigLoader::with_base_dir(PathBuf::from(temp_dir.path()));
    (temp_dir, loader)
}

#[test]
fn loads_defaults_when_no_env_present() {
    let _guard = env_guard();
    clear_env();

    let (_dir, loader) = empty_dir_loader();
    let cfg = loader.load().expect("config loads with defaults");

    assert_eq!(cfg.profile, "local");
    assert_eq!(cfg.api_bind_addr, "0.0.0.0:8080");
    assert_eq!(cfg.log_level, "info");
    assert_eq!(cfg.service_worker_username, "enterprise_worker");
    assert_eq!(cfg.pagination.page_size, 10);
    cfg.bind_addr().expect("default bind addr parses");
    clear_env();
}

#[test]
fn layered_env_files_apply_in_order() {
    let _guard = env_guard();
    clear_env();

    let temp_dir = TempDir::new().unwrap();
    write_env_file(&temp_dir, ".env", "ENTERPRISE_API_BIND_ADDR=127.0.0.1:3000\n");
    write_env_file(
        &temp_dir,
        ".env.test",
        "ENTERPRISE_API_BIND_ADDR=192.168.0.10:5000\n",
    );
    write_env_file(
        &temp_dir,
        ".env.test.local",
        "ENTERPRISE_API_BIND_ADDR=10.0.0.5:6000\n",
    );

    // Select profile via .env.local before profile-specific files load.
    write_env_file(
        &temp_dir,
        ".env.local",
        "ENTERPRISE_PROFILE=test\nENTERPRISE_API_BIND_ADDR=127.0.0.1:4000\n",
    );

    let loader = ConfigLoader::with_base_dir(PathBuf::from(temp_dir.path()));
    let cfg = loader.load().expect("config loads with layered env files");

    assert_eq!(cfg.profile, "test");
    assert_eq!(cfg.api_bind_addr, "10.0.0.5:6000");
    clear_env();
}

#[test]
fn os_environment_has_highest_precedence() {
    let _guard = env_guard();
    clear_env();

    let temp_dir = TempDir::new().unwrap();
    write_env_file(
        &temp_dir,
        ".env",
        "ENTERPRISE_API_BIND_ADDR=127.0.0.1:3000\nENTERPRISE_LMS_ROOT_URL=http://lms.file/\n",
    );

    unsafe {
        env::set_var("ENTERPRISE_API_BIND_ADDR", "0.0.0.0:9090");
    }

    let loader = ConfigLoader::with_base_dir(PathBuf::from(temp_dir.path()));
    let cfg = loader.load().expect("config loads with env override");
    assert_eq!(cfg.api_bind_addr, "0.0.0.0:9090");
    assert_eq!(cfg.lms_root_url, "http://lms.file");

    clear_env();
}

#[test]
fn catalog_url_gets_trailing_slash() {
    let _guard = env_guard();
    clear_env();

    unsafe {
        env::set_var(
            "ENTERPRISE_COURSE_CATALOG_API_URL",
            "https://catalog.example.com/api/v1",
        );
    }
    let (_dir, loader) = empty_dir_loader();
    let cfg = loader.load().expect("config loads");
    assert_eq!(
        cfg.course_catalog_api_url,
        "https://catalog.example.com/api/v1/"
    );

    clear_env();
}

#[test]
fn production_profile_requires_jwt_secret() {
    let _guard = env_guard();
    clear_env();

    unsafe {
        env::set_var("ENTERPRISE_PROFILE", "production");
    }
    let (_dir, loader) = empty_dir_loader();
    let err = loader.load().expect_err("missing secret should fail");
    assert!(matches!(err, ConfigError::MissingJwtSecret));

    unsafe {
        env::set_var("ENTERPRISE_JWT_SECRET_KEY", "s3cret");
    }
    let cfg = loader.load().expect("secret satisfies production profile");
    assert_eq!(cfg.jwt_secret(), "s3cret");
    assert!(!cfg.redacted_json().unwrap().contains("s3cret"));

    clear_env();
}

#[test]
fn invalid_throttle_rate_returns_error() {
    let _guard = env_guard();
    clear_env();

    unsafe {
        env::set_var("ENTERPRISE_THROTTLE_USER_RATE", "lots");
    }
    let (_dir, loader) = empty_dir_loader();
    let err = loader.load().expect_err("invalid rate should fail");
    assert!(matches!(err, ConfigError::InvalidThrottleRate { .. }));

    clear_env();
}

#[test]
fn invalid_bind_addr_returns_error() {
    let _guard = env_guard();
    clear_env();

    unsafe {
        env::set_var("ENTERPRISE_API_BIND_ADDR", "not-an-addr");
    }
    let (_dir, loader) = empty_dir_loader();
    let err = loader.load().expect_err("invalid bind addr should fail");
    assert!(format!("{}", err).contains("invalid api bind address"));

    clear_env();
}
