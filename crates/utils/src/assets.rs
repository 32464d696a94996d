use std::path::PathBuf;

use directories::ProjectDirs;

const QUALIFIER: &str = "dev";
const ORGANIZATION: &str = "projectdesk";
const APPLICATION: &str = "projectdesk";

/// Directory holding the SQLite database and other runtime data.
///
/// Debug builds keep everything under `./dev_assets` so local runs never touch
/// the user's real data directory.
pub fn asset_dir() -> std::io::Result<PathBuf> {
    let path = if cfg!(debug_assertions) {
        PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("../../dev_assets")
    } else {
        ProjectDirs::from(QUALIFIER, ORGANIZATION, APPLICATION)
            .ok_or_else(|| {
                std::io::Error::new(
                    std::io::ErrorKind::NotFound,
                    "OS didn't give us a home directory",
                )
            })?
            .data_dir()
            .to_path_buf()
    };

    if !path.exists() {
        std::fs::create_dir_all(&path)?;
        tracing::debug!(path = %path.display(), "Created asset directory");
    }

    Ok(path)
}

/// Default SQLite location inside [`asset_dir`].
pub fn database_path() -> std::io::Result<PathBuf> {
    Ok(asset_dir()?.join("db.sqlite"))
}
