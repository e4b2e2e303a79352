use std::env;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

use tracing::warn;

use crate::classifier::GeminiConfig;
use crate::store::{SheetsConfig, SheetsCredentials};

pub const DEFAULT_PRIMARY_MODEL: &str = "gemini-2.0-flash-exp";
pub const DEFAULT_FALLBACK_MODEL: &str = "gemini-1.5-flash";
/// Log filter used when `RUST_LOG` is unset.
pub const DEFAULT_LOG_FILTER: &str = "task_commander=debug,tower_http=info";

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum StoreKind {
    Sheets,
    Sqlite,
    Memory,
}

/// Where the task table lives. `Missing` keeps the app running with the store unavailable.
#[derive(Clone, Debug)]
pub enum StoreConfig {
    Sheets(SheetsConfig),
    Sqlite { database_url: String },
    Memory,
    Missing(String),
}

/// Everything read from the environment, built once at startup.
#[derive(Clone, Debug)]
pub struct AppConfig {
    pub bind_addr: SocketAddr,
    pub store: StoreConfig,
    pub gemini: Option<GeminiConfig>,
    pub primary_model: String,
    pub fallback_model: String,
    pub timeout: Duration,
    pub conflict_check: bool,
}

impl AppConfig {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let get = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        let bind_addr = get("BIND_ADDR")
            .and_then(|v| {
                v.parse::<SocketAddr>()
                    .map_err(|e| warn!("Ignoring invalid BIND_ADDR {:?}: {}", v, e))
                    .ok()
            })
            .unwrap_or_else(|| SocketAddr::from(([127, 0, 0, 1], 3000)));

        let timeout = Duration::from_secs(
            get("HTTP_TIMEOUT_SECS")
                .and_then(|v| v.parse::<u64>().ok())
                .filter(|secs| *secs > 0)
                .unwrap_or(30),
        );

        let store_kind = match get("TASKS_STORE").as_deref().map(str::to_ascii_lowercase).as_deref() {
            None | Some("sheets") => StoreKind::Sheets,
            Some("sqlite") => StoreKind::Sqlite,
            Some("memory") => StoreKind::Memory,
            Some(other) => {
                warn!("Unknown TASKS_STORE {:?}, using sheets", other);
                StoreKind::Sheets
            }
        };

        let store = match store_kind {
            StoreKind::Sheets => match (get("GOOGLE_SHEETS_SPREADSHEET_ID"), sheets_credentials(&get)) {
                (Some(spreadsheet_id), Some(credentials)) => StoreConfig::Sheets(SheetsConfig {
                    spreadsheet_id,
                    worksheet: get("GOOGLE_SHEETS_WORKSHEET").unwrap_or_else(|| "Sheet1".to_string()),
                    credentials,
                    timeout,
                }),
                (None, _) => {
                    StoreConfig::Missing("GOOGLE_SHEETS_SPREADSHEET_ID is not set".to_string())
                }
                (_, None) => StoreConfig::Missing(
                    "GOOGLE_APPLICATION_CREDENTIALS, GOOGLE_SERVICE_ACCOUNT_JSON or \
                     GOOGLE_SHEETS_ACCESS_TOKEN must be set"
                        .to_string(),
                ),
            },
            StoreKind::Sqlite => StoreConfig::Sqlite {
                database_url: get("DATABASE_URL")
                    .unwrap_or_else(|| "sqlite://tasks.db?mode=rwc".to_string()),
            },
            StoreKind::Memory => StoreConfig::Memory,
        };

        let gemini = get("GEMINI_API_KEY").map(|api_key| GeminiConfig { api_key, timeout });

        let conflict_check = get("TASKS_CONFLICT_CHECK")
            .map(|v| matches!(v.to_ascii_lowercase().as_str(), "1" | "true" | "yes" | "on"))
            .unwrap_or(false);

        Self {
            bind_addr,
            store,
            gemini,
            primary_model: get("GEMINI_PRIMARY_MODEL")
                .unwrap_or_else(|| DEFAULT_PRIMARY_MODEL.to_string()),
            fallback_model: get("GEMINI_FALLBACK_MODEL")
                .unwrap_or_else(|| DEFAULT_FALLBACK_MODEL.to_string()),
            timeout,
            conflict_check,
        }
    }
}

/// A static access token overrides the service account; inline key JSON beats a key file.
fn sheets_credentials(get: &impl Fn(&str) -> Option<String>) -> Option<SheetsCredentials> {
    get("GOOGLE_SHEETS_ACCESS_TOKEN")
        .map(SheetsCredentials::AccessToken)
        .or_else(|| get("GOOGLE_SERVICE_ACCOUNT_JSON").map(SheetsCredentials::ServiceAccountJson))
        .or_else(|| {
            get("GOOGLE_APPLICATION_CREDENTIALS")
                .map(|path| SheetsCredentials::ServiceAccountFile(PathBuf::from(path)))
        })
}
