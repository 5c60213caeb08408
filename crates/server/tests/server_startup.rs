//! Startup failures of the `lectern` binary.

use std::io::Write;
use std::process::Output;
use std::time::Duration;

use tempfile::{NamedTempFile, TempDir};
use tokio::time::timeout;

/// Run the server with the given config file and wait for it to exit.
async fn run_server(config_path: &std::path::Path) -> Output {
    timeout(
        Duration::from_secs(10),
        tokio::process::Command::new(env!("CARGO_BIN_EXE_lectern"))
            .env("LECTERN_CONFIG", config_path)
            .env("RUST_LOG", "error")
            .kill_on_drop(true)
            .output(),
    )
    .await
    .expect("Command timed out")
    .expect("Failed to execute command")
}

fn write_config(contents: &str) -> NamedTempFile {
    let mut temp_file = NamedTempFile::new().unwrap();
    temp_file.write_all(contents.as_bytes()).unwrap();
    temp_file.flush().unwrap();
    temp_file
}

#[tokio::test]
async fn test_missing_config_file_exits_with_error() {
    let result = run_server(std::path::Path::new("/nonexistent/config.toml")).await;

    assert!(!result.status.success());
}

#[tokio::test]
async fn test_config_without_providers_exits_with_error() {
    let config = write_config(
        r#"
[server]
host = "127.0.0.1"
port = 8080
"#,
    );

    let result = run_server(config.path()).await;

    assert!(!result.status.success());
}

#[tokio::test]
async fn test_missing_required_tools_exits_with_error() {
    let dir = TempDir::new().unwrap();
    let config = write_config(&format!(
        r#"
[server]
host = "127.0.0.1"
port = 0

[database]
path = "{db}"

[providers]
default = "openrouter"

[providers.openrouter]
api_key = "sk-or-test"

[providers.openai]
api_key = "sk-test"

[tools]
ffprobe_path = "/nonexistent/ffprobe"
ffmpeg_path = "/nonexistent/ffmpeg"
soffice_path = "/nonexistent/soffice"
pdftoppm_path = "/nonexistent/pdftoppm"
"#,
        db = dir.path().join("lectern.db").display()
    ));

    let result = run_server(config.path()).await;

    assert!(!result.status.success());
}
