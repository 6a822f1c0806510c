use std::io::Write;

use config::Config as ConfigBuilder;
use tempfile::NamedTempFile;

use crate::config::models::AppConfig;

#[test]
fn test_load_from_file() {
    let mut file = NamedTempFile::new().unwrap();
    writeln!(
        file,
        r#"
[manager]
device_name = "archive-node-1"

[[queues]]
name = "StgVerTasks"
max_queue_size = 5
"#
    )
    .unwrap();

    let path = file.path().to_str().unwrap().to_string();
    let config = AppConfig::load(Some(&path)).unwrap();

    assert_eq!(config.manager.device_name, "archive-node-1");
    assert_eq!(config.queue("StgVerTasks").unwrap().max_queue_size, 5);
    // 未出现的段落使用默认值
    assert_eq!(config.manager.query_fetch_size, 100);
    assert!(config.message_queue.is_in_memory());
}

#[test]
fn test_load_missing_file_fails() {
    let result = AppConfig::load(Some("/nonexistent/queue.toml"));
    assert!(result.is_err());
    assert!(result.unwrap_err().to_string().contains("配置文件不存在"));
}

#[test]
fn test_load_rejects_invalid_file() {
    let mut file = NamedTempFile::new().unwrap();
    writeln!(
        file,
        r#"
[manager]
query_fetch_size = 0
"#
    )
    .unwrap();

    let path = file.path().to_str().unwrap().to_string();
    assert!(AppConfig::load(Some(&path)).is_err());
}

#[test]
fn test_environment_overrides_nested_keys() {
    let mut vars = config::Map::new();
    vars.insert("QUEUE_MANAGER__DEVICE_NAME".to_string(), "archive-env".to_string());
    vars.insert("QUEUE_MANAGER__QUERY_FETCH_SIZE".to_string(), "25".to_string());

    let config: AppConfig = ConfigBuilder::builder()
        .add_source(config::File::from_str(
            &AppConfig::default().to_toml().unwrap(),
            config::FileFormat::Toml,
        ))
        .add_source(AppConfig::environment().source(Some(vars)))
        .build()
        .unwrap()
        .try_deserialize()
        .unwrap();

    assert_eq!(config.manager.device_name, "archive-env");
    assert_eq!(config.manager.query_fetch_size, 25);
}
