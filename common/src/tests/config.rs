use serde::Deserialize;
use serial_test::serial;

use crate::config::{parse, ConfigError, DatabaseConfig, LoggingConfig};
use crate::logging::Mode;

fn clear_env() {
	for (key, _) in std::env::vars() {
		if key.starts_with("CFGTEST_") {
			std::env::remove_var(key);
		}
	}
}

#[derive(Deserialize, Debug, Default)]
#[serde(default)]
struct Config {
	foo: String,
	bar: u32,
	tags: Vec<String>,
	logging: LoggingConfig,
	database: DatabaseConfig,
}

#[test]
#[serial]
fn test_defaults_without_file() {
	clear_env();

	let (config, file): (Config, _) = parse("CFGTEST", Some("/nonexistent/config"), &[]).expect("failed to parse config");
	assert!(file.is_none());
	assert_eq!(config.logging, LoggingConfig::default());
	assert_eq!(config.database.max_connections, 5);
}

#[test]
#[serial]
fn test_parse_file() {
	clear_env();

	let tmp_dir = tempfile::tempdir().expect("failed to create temp dir");
	let config_file = tmp_dir.path().join("config.toml");

	std::fs::write(
		&config_file,
		r#"
foo = "foo"
bar = 3

[logging]
level = "debug"
mode = "json"
"#,
	)
	.expect("failed to write config file");

	let path = tmp_dir.path().join("config");
	let (config, file): (Config, _) =
		parse("CFGTEST", Some(path.to_str().expect("utf8 path")), &[]).expect("failed to parse config");

	assert!(file.expect("file should be reported").ends_with("config.toml"));
	assert_eq!(config.foo, "foo");
	assert_eq!(config.bar, 3);
	assert_eq!(config.logging.level, "debug");
	assert_eq!(config.logging.mode, Mode::Json);
	assert_eq!(config.database, DatabaseConfig::default());
}

#[test]
#[serial]
fn test_env_overrides_file() {
	clear_env();

	let tmp_dir = tempfile::tempdir().expect("failed to create temp dir");
	let config_file = tmp_dir.path().join("worker.toml");

	std::fs::write(
		&config_file,
		r#"
foo = "from-file"

[database]
uri = "postgres://file/db"
max_connections = 2
"#,
	)
	.expect("failed to write config file");

	std::env::set_var("CFGTEST_CONFIG_FILE", config_file.to_str().expect("utf8 path"));
	std::env::set_var("CFGTEST_FOO", "from-env");
	std::env::set_var("CFGTEST_BAR", "7");
	std::env::set_var("CFGTEST_TAGS", "a, b");
	std::env::set_var("CFGTEST_DATABASE__MAX_CONNECTIONS", "9");

	let (config, _): (Config, _) = parse("CFGTEST", None, &["tags"]).expect("failed to parse config");
	clear_env();

	assert_eq!(config.foo, "from-env");
	assert_eq!(config.bar, 7);
	assert_eq!(config.tags, vec!["a".to_string(), "b".to_string()]);
	assert_eq!(config.database.uri, "postgres://file/db");
	assert_eq!(config.database.max_connections, 9);
}

#[test]
#[serial]
fn test_missing_explicit_file() {
	clear_env();

	std::env::set_var("CFGTEST_CONFIG_FILE", "/nonexistent/worker.toml");
	let result = parse::<Config>("CFGTEST", None, &[]);
	clear_env();

	assert!(matches!(result, Err(ConfigError::Io { .. })));
}

#[test]
#[serial]
fn test_invalid_type() {
	clear_env();

	std::env::set_var("CFGTEST_BAR", "not-a-number");
	let result = parse::<Config>("CFGTEST", None, &[]);
	clear_env();

	assert!(matches!(result, Err(ConfigError::Invalid(_))));
}

#[test]
#[serial]
fn test_env_strings_are_not_coerced() {
	clear_env();

	std::env::set_var("CFGTEST_FOO", "1234567890");
	std::env::set_var("CFGTEST_LOGGING__LEVEL", "true");
	std::env::set_var("CFGTEST_DATABASE__URI", "2024-03-12");
	std::env::set_var("CFGTEST_BAR", "12");

	let (config, _): (Config, _) = parse("CFGTEST", None, &[]).expect("failed to parse config");
	clear_env();

	assert_eq!(config.foo, "1234567890");
	assert_eq!(config.logging.level, "true");
	assert_eq!(config.database.uri, "2024-03-12");
	assert_eq!(config.bar, 12);
}

#[test]
#[serial]
fn test_single_item_list() {
	clear_env();

	std::env::set_var("CFGTEST_TAGS", "42");

	let (config, _): (Config, _) = parse("CFGTEST", None, &["tags"]).expect("failed to parse config");
	clear_env();

	assert_eq!(config.tags, vec!["42".to_string()]);
}
