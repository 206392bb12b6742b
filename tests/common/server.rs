//! Test server management.
//!
//! Spawns and manages cipherd instances for integration testing.

use std::path::PathBuf;
use std::process::{Child, Command, Stdio};
use std::time::Duration;
use tempfile::TempDir;
use tokio::time::sleep;

/// A test server instance.
///
/// Listens for WebSocket sessions on `port` and serves the HTTP API on
/// `port + 1`. The directory is seeded with mohammad, khader and alice.
pub struct TestServer {
    child: Child,
    port: u16,
    _data_dir: TempDir,
}

impl TestServer {
    /// Spawn a test server with the default configuration.
    pub async fn spawn(port: u16) -> anyhow::Result<Self> {
        Self::spawn_with(port, "").await
    }

    /// Spawn a test server, appending `extra` to the generated config.
    ///
    /// `extra` may add `[session]` or `[limits]` tables.
    pub async fn spawn_with(port: u16, extra: &str) -> anyhow::Result<Self> {
        let data_dir = tempfile::tempdir()?;
        let db_path = data_dir.path().join("cipher.db");

        let config_path = data_dir.path().join("config.toml");
        let config_content = format!(
            r#"
[server]
name = "cipher.test"

[listen]
address = "127.0.0.1:{ws_port}"

[http]
address = "127.0.0.1:{http_port}"

[database]
path = "{db_path}"

[[user]]
user_id = "mohammad"
display_name = "Mohammad S. Khalaf"

[[user]]
user_id = "khader"
display_name = "Khader A. Murtaja"

[[user]]
user_id = "alice"
display_name = "Alice Johnson"

{extra}
"#,
            ws_port = port,
            http_port = port + 1,
            db_path = db_path.display(),
        );
        std::fs::write(&config_path, config_content)?;

        let binary_path = PathBuf::from(env!("CARGO_BIN_EXE_cipherd"));
        let child = Command::new(&binary_path)
            .arg(&config_path)
            .env("RUST_LOG", "cipherd=debug")
            .stdout(Stdio::null())
            .spawn()?;

        let server = Self {
            child,
            port,
            _data_dir: data_dir,
        };

        server.wait_until_ready().await?;

        Ok(server)
    }

    /// Wait until both listeners are accepting connections.
    async fn wait_until_ready(&self) -> anyhow::Result<()> {
        for port in [self.port, self.port + 1] {
            let mut ready = false;
            for _ in 0..50 {
                if tokio::net::TcpStream::connect(("127.0.0.1", port))
                    .await
                    .is_ok()
                {
                    ready = true;
                    break;
                }
                sleep(Duration::from_millis(100)).await;
            }
            if !ready {
                anyhow::bail!("Server failed to listen on port {port} within 5 seconds");
            }
        }
        Ok(())
    }

    /// WebSocket URL for a user session.
    pub fn ws_url(&self, user_id: &str) -> String {
        format!("ws://127.0.0.1:{}/ws/{}", self.port, user_id)
    }

    /// Base URL of the HTTP API.
    pub fn http_url(&self, path: &str) -> String {
        format!("http://127.0.0.1:{}{}", self.port + 1, path)
    }

    /// Open a session for `user_id`.
    pub async fn connect(&self, user_id: &str) -> anyhow::Result<super::client::TestClient> {
        super::client::TestClient::connect(&self.ws_url(user_id)).await
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        let _ = self.child.kill();
        let _ = self.child.wait();
    }
}
