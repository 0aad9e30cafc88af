use geojson::{FeatureCollection, GeoJson};
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::info;

#[derive(Debug, Error)]
pub enum LoadError {
    #[error("GeoJSON file not found: {0:?}")]
    NotFound(PathBuf),
    #[error("Failed to read GeoJSON file {path:?}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("Failed to parse GeoJSON file {path:?}")]
    Parse {
        path: PathBuf,
        #[source]
        source: geojson::Error,
    },
    #[error("GeoJSON must be a FeatureCollection: {0:?}")]
    NotCollection(PathBuf),
}

fn read_error(path: &Path, source: std::io::Error) -> LoadError {
    if source.kind() == std::io::ErrorKind::NotFound {
        LoadError::NotFound(path.to_path_buf())
    } else {
        LoadError::Io { path: path.to_path_buf(), source }
    }
}

fn parse_collection(path: &Path, content: &str) -> Result<FeatureCollection, LoadError> {
    // warning: this holds the whole file in memory.
    let geojson: GeoJson = content.parse()
        .map_err(|source| LoadError::Parse { path: path.to_path_buf(), source })?;

    match geojson {
        GeoJson::FeatureCollection(fc) => Ok(fc),
        _ => Err(LoadError::NotCollection(path.to_path_buf())),
    }
}

/// Blocking load, used once at startup and by the CLI.
pub fn load_collection(path: &Path) -> Result<FeatureCollection, LoadError> {
    info!(?path, "Loading GeoJSON");
    let content = std::fs::read_to_string(path).map_err(|e| read_error(path, e))?;
    let collection = parse_collection(path, &content)?;
    info!(features = collection.features.len(), ?path, "Loaded GeoJSON");
    Ok(collection)
}

/// Non-blocking load for the district files requested while serving.
pub async fn fetch_collection(path: PathBuf) -> Result<FeatureCollection, LoadError> {
    let content = tokio::fs::read_to_string(&path).await.map_err(|e| read_error(&path, e))?;
    parse_collection(&path, &content)
}
