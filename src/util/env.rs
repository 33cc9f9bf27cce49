//! Environment helpers: centralized dotenv loading, lookups and redaction.
//! Call `init_env()` once early in each binary (or rely on lazy Once).
use std::sync::Once;
use tracing::info;

static INIT: Once = Once::new();

/// Load .env exactly once. Safe to call many times.
pub fn init_env() {
    INIT.call_once(|| {
        if dotenv::dotenv().is_ok() {
            return;
        }
        // Fallback to the crate root so `cargo run` from a subdirectory still works.
        let candidate = format!("{}/.env", env!("CARGO_MANIFEST_DIR"));
        let _ = dotenv::from_filename(candidate);
    });
}

/// Get optional env var (None if unset or empty).
pub fn env_opt(key: &str) -> Option<String> {
    init_env();
    match std::env::var(key) {
        Ok(v) if !v.trim().is_empty() => Some(v),
        _ => None,
    }
}

/// Mask values whose key looks sensitive. Database URLs keep only scheme and path.
pub fn redact_value(key: &str, val: &str) -> String {
    let k = key.to_ascii_uppercase();
    if k.contains("SECRET") || k.contains("KEY") || k.contains("PASSWORD") || k.contains("TOKEN")
    {
        if val.trim().is_empty() {
            return String::new();
        }
        return "***".to_string();
    }

    let val_trim = val.trim();
    if k.contains("URL") {
        if let Ok(mut u) = url::Url::parse(val_trim) {
            if !u.username().is_empty() || u.password().is_some() {
                let _ = u.set_username("***");
                let _ = u.set_password(Some("***"));
            }
            return u.to_string();
        }
    }

    val_trim.to_string()
}

/// Log a consolidated, redacted snapshot of the given `(name, value)` pairs.
pub fn log_snapshot(title: &str, pairs: &[(&str, Option<String>)]) {
    let snapshot: Vec<(String, String)> = pairs
        .iter()
        .map(|(k, v)| {
            let raw = v.clone().unwrap_or_default();
            (k.to_string(), redact_value(k, &raw))
        })
        .collect();
    info!(target = "preflight", title, snapshot = ?snapshot, "configuration snapshot");
}
