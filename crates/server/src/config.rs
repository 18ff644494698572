// crates/server/src/config.rs
//! Runtime settings: command-line flags with `DOCFLOW_*` environment fallbacks.

use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::path::PathBuf;
use std::time::Duration;

use clap::Parser;
use docflow_core::{DetailMode, TitleChunker};

pub const DEFAULT_PORT: u16 = 47900;
pub const DEFAULT_MAX_FILE_SIZE: u64 = 10 * 1024 * 1024;

#[derive(Debug, Clone, Parser)]
#[command(name = "docflow", version, about = "Document ingestion server with live progress")]
pub struct Settings {
    /// Port to listen on.
    #[arg(long, env = "DOCFLOW_PORT", default_value_t = DEFAULT_PORT)]
    pub port: u16,

    /// Address to bind.
    #[arg(long, env = "DOCFLOW_HOST", default_value = "127.0.0.1")]
    pub host: IpAddr,

    /// Root for the database and uploads. Defaults to `<data dir>/docflow`.
    #[arg(long, env = "DOCFLOW_DATA_DIR")]
    pub data_dir: Option<PathBuf>,

    /// SQLite database file. Defaults to `<data_dir>/docflow.db`.
    #[arg(long, env = "DOCFLOW_DATABASE")]
    pub database: Option<PathBuf>,

    /// Where uploaded files are stored. Defaults to `<data_dir>/uploads`.
    #[arg(long, env = "DOCFLOW_UPLOAD_DIR")]
    pub upload_dir: Option<PathBuf>,

    /// Largest accepted upload, in bytes.
    #[arg(long, env = "DOCFLOW_MAX_FILE_SIZE", default_value_t = DEFAULT_MAX_FILE_SIZE)]
    pub max_file_size: u64,

    /// Accepted file extensions, comma separated.
    #[arg(
        long,
        env = "DOCFLOW_ALLOWED_EXTENSIONS",
        value_delimiter = ',',
        default_values = ["pdf", "txt", "md"]
    )]
    pub allowed_extensions: Vec<String>,

    #[arg(long, env = "DOCFLOW_CHUNK_MAX_CHARS", default_value_t = 3000)]
    pub chunk_max_chars: usize,

    #[arg(long, env = "DOCFLOW_CHUNK_NEW_AFTER_CHARS", default_value_t = 2400)]
    pub chunk_new_after_chars: usize,

    #[arg(long, env = "DOCFLOW_CHUNK_COMBINE_UNDER_CHARS", default_value_t = 500)]
    pub chunk_combine_under_chars: usize,

    /// Seconds without a client frame before the server sends `{"type":"ping"}`.
    #[arg(long, env = "DOCFLOW_WS_IDLE_TIMEOUT_SECS", default_value_t = 30)]
    pub ws_idle_timeout_secs: u64,

    /// Live connections older than this are reaped.
    #[arg(long, env = "DOCFLOW_STALE_CONNECTION_SECS", default_value_t = 3600)]
    pub stale_connection_secs: u64,

    #[arg(long, env = "DOCFLOW_REAP_INTERVAL_SECS", default_value_t = 60)]
    pub reap_interval_secs: u64,

    /// CORS origins, comma separated. Empty allows any origin.
    #[arg(long, env = "DOCFLOW_ALLOWED_ORIGINS", value_delimiter = ',')]
    pub allowed_origins: Vec<String>,

    /// `full` sends the whole accumulated detail map with every event,
    /// `delta` only the fields each report wrote.
    #[arg(long, env = "DOCFLOW_DETAIL_MODE", default_value = "full")]
    pub detail_mode: DetailMode,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            port: DEFAULT_PORT,
            host: IpAddr::V4(Ipv4Addr::LOCALHOST),
            data_dir: None,
            database: None,
            upload_dir: None,
            max_file_size: DEFAULT_MAX_FILE_SIZE,
            allowed_extensions: vec!["pdf".into(), "txt".into(), "md".into()],
            chunk_max_chars: 3000,
            chunk_new_after_chars: 2400,
            chunk_combine_under_chars: 500,
            ws_idle_timeout_secs: 30,
            stale_connection_secs: 3600,
            reap_interval_secs: 60,
            allowed_origins: Vec::new(),
            detail_mode: DetailMode::Full,
        }
    }
}

impl Settings {
    pub fn socket_addr(&self) -> SocketAddr {
        SocketAddr::new(self.host, self.port)
    }

    pub fn data_dir(&self) -> PathBuf {
        self.data_dir
            .clone()
            .or_else(|| dirs::data_dir().map(|d| d.join("docflow")))
            .unwrap_or_else(|| PathBuf::from(".docflow"))
    }

    pub fn database_path(&self) -> PathBuf {
        self.database
            .clone()
            .unwrap_or_else(|| self.data_dir().join("docflow.db"))
    }

    pub fn upload_path(&self) -> PathBuf {
        self.upload_dir
            .clone()
            .unwrap_or_else(|| self.data_dir().join("uploads"))
    }

    /// Whether `filename` carries one of the accepted extensions (case-insensitive).
    pub fn accepts_extension(&self, filename: &str) -> bool {
        let Some((_, ext)) = filename.rsplit_once('.') else {
            return false;
        };
        self.allowed_extensions
            .iter()
            .any(|allowed| allowed.trim().eq_ignore_ascii_case(ext))
    }

    pub fn chunker(&self) -> TitleChunker {
        TitleChunker {
            max_chars: self.chunk_max_chars,
            new_after_chars: self.chunk_new_after_chars,
            combine_under_chars: self.chunk_combine_under_chars,
        }
    }

    pub fn ws_idle_timeout(&self) -> Duration {
        Duration::from_secs(self.ws_idle_timeout_secs.max(1))
    }

    pub fn stale_connection(&self) -> Duration {
        Duration::from_secs(self.stale_connection_secs)
    }

    pub fn reap_interval(&self) -> Duration {
        Duration::from_secs(self.reap_interval_secs.max(1))
    }
}
