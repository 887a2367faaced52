//! Shared helpers for persona-auth integration tests

#![allow(dead_code)]

use std::path::{Path, PathBuf};

/// Setup logging for tests
pub fn setup_test_logging() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter("persona_auth=debug")
        .with_test_writer()
        .try_init();
}

/// Absolute path of a PEM fixture
pub fn fixture(name: &str) -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR"))
        .join("tests")
        .join("fixtures")
        .join(name)
}

/// Published-mode TOML configuration using `key` and an SQLite file under `dir`
pub fn published_config(key_type: &str, key: &str, dir: &Path, layout: &str) -> String {
    format!(
        r#"
issuer = "example.org"
certificate-url = "/persona/certificate"
signature-layout = "{layout}"

[private-key]
type = "{key_type}"
file = "{key}"

[authentication]
url = "/persona/sign_in"
disabled = true

[provisioning]
url = "/persona/provision"
disabled = true

[session]
url = "/persona/session"
store = "sqlite"
backing = "{backing}"
"#,
        key = fixture(key).display(),
        backing = dir.join("sessions.db").display(),
    )
}
