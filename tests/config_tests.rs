//! Loading `DispatchConfig` from files and wiring it into a dispatcher.

use brrtdispatch::config::DispatchConfig;
use brrtdispatch::dispatcher::Dispatcher;
use brrtdispatch::router::RouteTable;
use std::io::Write;
use std::sync::Arc;
use std::time::Duration;

#[test]
fn test_from_yaml_file() {
    let mut file = tempfile::Builder::new().suffix(".yaml").tempfile().unwrap();
    writeln!(
        file,
        "http:\n  response_timeout_ms: 250\n  server_name: Records\nruntime:\n  stack_size: 32768"
    )
    .unwrap();

    let config = DispatchConfig::from_yaml_file(file.path()).unwrap();
    assert_eq!(config.response_timeout(), Some(Duration::from_millis(250)));
    assert_eq!(config.runtime.stack_size, 32768);

    let dispatcher = Dispatcher::builder(Arc::new(RouteTable::builder().build()))
        .config(config)
        .build();
    assert_eq!(dispatcher.response_timeout(), Some(Duration::from_millis(250)));
    assert_eq!(
        dispatcher.server_header().to_str().unwrap(),
        format!("Records/{}", env!("CARGO_PKG_VERSION"))
    );
}

#[test]
fn test_empty_file_uses_defaults() {
    let file = tempfile::NamedTempFile::new().unwrap();
    let config = DispatchConfig::from_yaml_file(file.path()).unwrap();
    assert_eq!(config, DispatchConfig::default());
}

#[test]
fn test_missing_file_names_the_path() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("absent.yaml");
    let err = DispatchConfig::from_yaml_file(&path).unwrap_err();
    assert!(format!("{err:#}").contains("absent.yaml"));
}

#[test]
fn test_invalid_server_name_falls_back() {
    let mut config = DispatchConfig::default();
    config.http.server_name = "bad\nname".to_string();
    let dispatcher = Dispatcher::builder(Arc::new(RouteTable::builder().build()))
        .config(config)
        .build();
    assert!(dispatcher
        .server_header()
        .to_str()
        .unwrap()
        .starts_with("BRRTDispatch/"));
}
