use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};
use tracing_subscriber::EnvFilter;

use cache::CacheStore;
use common::{RawSong, Separators};
use index::{DirectoryFilter, FsMediaIndex};
use pipeline::{Pipeline, Settings};

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
struct ScanConfig {
    music_root: String,
    cache_path: String,
    cache_enabled: bool,
    // Multi-value tag separator characters, e.g. ";," for both.
    separators: String,
    music_dirs: Vec<String>,
    music_dirs_include: bool,
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self {
            music_root: String::new(),
            cache_path: "data/songs.redb".to_string(),
            cache_enabled: true,
            separators: String::new(),
            music_dirs: Vec::new(),
            music_dirs_include: false,
        }
    }
}

#[derive(Debug)]
enum ConfigError {
    Io(std::io::Error),
    Yaml(serde_yaml::Error),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::Io(err) => write!(f, "io error: {}", err),
            ConfigError::Yaml(err) => write!(f, "yaml error: {}", err),
        }
    }
}

impl std::error::Error for ConfigError {}

impl From<std::io::Error> for ConfigError {
    fn from(err: std::io::Error) -> Self {
        ConfigError::Io(err)
    }
}

impl From<serde_yaml::Error> for ConfigError {
    fn from(err: serde_yaml::Error) -> Self {
        ConfigError::Yaml(err)
    }
}

fn config_path_from_env() -> PathBuf {
    match env::var("MADRIGAL_CONFIG") {
        Ok(value) if !value.trim().is_empty() => PathBuf::from(value),
        _ => PathBuf::from("scan.yaml"),
    }
}

fn load_or_create_config(path: &Path) -> Result<(ScanConfig, bool), ConfigError> {
    if path.exists() {
        let contents = fs::read_to_string(path)?;
        let config: ScanConfig = serde_yaml::from_str(&contents)?;
        return Ok((config, false));
    }

    let config = ScanConfig::default();
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)?;
        }
    }
    fs::write(path, serde_yaml::to_string(&config)?)?;
    Ok((config, true))
}

fn resolve_path(config_path: &Path, value: &str) -> PathBuf {
    let raw = PathBuf::from(value);
    if raw.is_absolute() {
        return raw;
    }
    let base = config_path
        .parent()
        .filter(|parent| !parent.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));
    base.join(raw)
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into());
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let config_path = config_path_from_env();
    let (config, created) = load_or_create_config(&config_path)?;
    if created {
        info!("wrote default config to {}", config_path.display());
    }

    let music_root = match env::args().nth(1) {
        Some(arg) => PathBuf::from(arg),
        None => {
            let configured = config.music_root.trim();
            if configured.is_empty() {
                return Err("music_root not set; pass a path or set it in the config".into());
            }
            resolve_path(&config_path, configured)
        }
    };
    let cache_path = resolve_path(&config_path, &config.cache_path);

    let mut settings = Settings {
        separators: Separators::from_chars(&config.separators),
        directory_filter: DirectoryFilter {
            dirs: config.music_dirs.iter().map(PathBuf::from).collect(),
            include: config.music_dirs_include,
        },
        cache_enabled: config.cache_enabled,
    };

    // A cache that cannot be opened costs a full extraction, not the scan.
    let store = match CacheStore::open(&cache_path) {
        Ok(store) => Some(store),
        Err(err) => {
            warn!(
                "cannot open song cache at {}: {}; scanning without it",
                cache_path.display(),
                err
            );
            settings.cache_enabled = false;
            None
        }
    };

    info!("scanning {}", music_root.display());
    let pipeline = Pipeline::new(FsMediaIndex::new(music_root), store, settings);

    let stats = pipeline
        .run(&mut |song: RawSong| {
            let label = song
                .name
                .as_deref()
                .or(song.file_name.as_deref())
                .unwrap_or("<untitled>");
            debug!("scanned {}", label);
        })
        .await?;

    println!(
        "Scanned: {} songs ({} from cache, {} extracted)",
        stats.songs, stats.cache_hits, stats.cache_misses
    );

    Ok(())
}
