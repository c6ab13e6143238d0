use std::path::PathBuf;
use std::sync::OnceLock;

static EXE_DIR: OnceLock<PathBuf> = OnceLock::new();

/// Returns the directory containing the executable.
pub fn get_exe_dir() -> &'static PathBuf {
    EXE_DIR.get_or_init(|| {
        std::env::current_exe()
            .ok()
            .and_then(|p| p.parent().map(|p| p.to_path_buf()))
            .unwrap_or_else(|| PathBuf::from("."))
    })
}

/// Returns the logs directory: `<exe_dir>/logs/`
pub fn get_logs_dir() -> PathBuf {
    get_exe_dir().join("logs")
}

/// Returns the data directory: `<exe_dir>/data/`
pub fn get_data_dir() -> PathBuf {
    get_exe_dir().join("data")
}

/// Returns the plate note store path: `<exe_dir>/data/plates_db.json`
pub fn get_plates_db_path() -> PathBuf {
    get_data_dir().join("plates_db.json")
}

/// Returns the prefix map path: `<exe_dir>/data/prefix_map_pl.json`
pub fn get_prefix_map_path() -> PathBuf {
    get_data_dir().join("prefix_map_pl.json")
}

/// Resolves a configured directory against the executable directory unless
/// it is already absolute.
pub fn resolve_dir(configured: &str) -> PathBuf {
    let path = PathBuf::from(configured);
    if path.is_absolute() {
        path
    } else {
        get_exe_dir().join(path)
    }
}

/// Ensures all output directories exist. Call at startup.
pub fn ensure_directories() -> std::io::Result<()> {
    std::fs::create_dir_all(get_logs_dir())?;
    std::fs::create_dir_all(get_data_dir())?;
    Ok(())
}
