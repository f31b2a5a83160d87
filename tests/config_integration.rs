use colloquy::config::AppConfig;
use serial_test::serial;
use std::env;
use std::fs;

// Helper to clear environment variables that might interfere with tests
fn clear_env_vars() {
    unsafe {
        env::remove_var("COLLOQUY_SERVER__PORT");
        env::remove_var("COLLOQUY_STORAGE__PATH");
        env::remove_var("COLLOQUY_BRANDING__APP_NAME");
        env::remove_var("CONFIG_FILE");
    }
}

// Loads with a fixed argv so the test harness's own flags never reach clap.
fn load() -> Result<AppConfig, config::ConfigError> {
    AppConfig::load_from_args(["colloquy"])
}

#[test]
#[serial]
fn test_default_config() {
    clear_env_vars();

    let config = load().expect("defaults should load");
    assert_eq!(config.server.port, 3000);
    assert_eq!(config.server.host, "127.0.0.1");
    assert_eq!(config.storage.path, "colloquy-state.json");
    assert_eq!(config.branding.app_name, "Colloquy");
    assert!(!config.resilience.timeout_disabled);
}

#[test]
#[serial]
fn test_env_override() {
    clear_env_vars();
    unsafe {
        env::set_var("COLLOQUY_SERVER__PORT", "9090");
        env::set_var("COLLOQUY_BRANDING__APP_NAME", "Orrery");
    }

    let config = load().expect("Failed to load config");
    assert_eq!(config.server.port, 9090);
    assert_eq!(config.branding.app_name, "Orrery");

    clear_env_vars();
}

#[test]
#[serial]
fn test_cli_flag_beats_env() {
    clear_env_vars();
    unsafe {
        env::set_var("COLLOQUY_SERVER__PORT", "9090");
    }

    let config = AppConfig::load_from_args(["colloquy", "--port", "4040"])
        .expect("Failed to load config");
    assert_eq!(config.server.port, 4040);

    clear_env_vars();
}

#[test]
#[serial]
fn test_file_load() {
    clear_env_vars();

    let config_content = r"
server:
  port: 7070
storage:
  path: elsewhere.json
    ";

    let file_path = "test_config.yaml";
    fs::write(file_path, config_content).expect("Failed to write temp config");

    unsafe {
        env::set_var("CONFIG_FILE", file_path);
    }

    let config = load().expect("Failed to load config from file");
    assert_eq!(config.server.port, 7070);
    assert_eq!(config.storage.path, "elsewhere.json");

    fs::remove_file(file_path).unwrap();
    clear_env_vars();
}

#[test]
#[serial]
fn test_cwd_config_fallback() {
    clear_env_vars();

    let config_content = r"
server:
  port: 6060
    ";
    let cwd_path = "config.yaml";
    fs::write(cwd_path, config_content).expect("Failed to write ./config.yaml");

    let config = load().expect("Failed to load config");

    let result = std::panic::catch_unwind(|| {
        assert_eq!(config.server.port, 6060);
    });

    fs::remove_file(cwd_path).unwrap();

    if let Err(e) = result {
        std::panic::resume_unwind(e);
    }
}
