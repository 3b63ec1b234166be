//! File import for the `import_file` admin command.
//!
//! `.geojson` files are read directly. `.shp` files are first converted to
//! GeoJSON by an external converter writing to a scratch file, which is
//! removed afterwards whether or not the import succeeds.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use geolayer_core::{new_datasource_id, GeoError, GeoResult, Layer};
use tokio::process::Command;

/// Converts a shapefile into a GeoJSON feature collection file.
#[async_trait]
pub trait ShapefileConverter: Send + Sync {
    async fn convert(&self, input: &Path, output: &Path) -> GeoResult<()>;
}

/// Converter backed by GDAL's `ogr2ogr`, reprojecting to CRS84.
#[derive(Debug, Clone)]
pub struct Ogr2OgrConverter {
    program: PathBuf,
}

impl Ogr2OgrConverter {
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
        }
    }
}

#[async_trait]
impl ShapefileConverter for Ogr2OgrConverter {
    async fn convert(&self, input: &Path, output: &Path) -> GeoResult<()> {
        tracing::debug!(
            program = %self.program.display(),
            input = %input.display(),
            output = %output.display(),
            "Converting shapefile"
        );
        let result = Command::new(&self.program)
            .args(["-f", "GeoJSON", "-t_srs", "crs:84"])
            .arg(output)
            .arg(input)
            .output()
            .await
            .map_err(|e| {
                GeoError::Internal(format!(
                    "failed to run {}: {}",
                    self.program.display(),
                    e
                ))
            })?;

        if !result.status.success() {
            let stderr = String::from_utf8_lossy(&result.stderr);
            return Err(GeoError::Internal(format!(
                "shapefile conversion failed ({}): {}",
                result.status,
                stderr.trim()
            )));
        }
        Ok(())
    }
}

/// Supported import formats, chosen by file extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImportFormat {
    GeoJson,
    Shapefile,
}

impl ImportFormat {
    pub fn from_path(path: &Path) -> GeoResult<Self> {
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .map(str::to_ascii_lowercase)
            .ok_or_else(|| {
                GeoError::BadRequest(format!(
                    "unsupported file type: {} has no extension",
                    path.display()
                ))
            })?;
        match ext.as_str() {
            "geojson" => Ok(ImportFormat::GeoJson),
            "shp" => Ok(ImportFormat::Shapefile),
            other => Err(GeoError::BadRequest(format!("unsupported file type: {}", other))),
        }
    }
}

/// Loads layers from files on the server's filesystem.
#[derive(Clone)]
pub struct Importer {
    converter: Arc<dyn ShapefileConverter>,
    scratch_dir: PathBuf,
}

impl Importer {
    pub fn new(converter: Arc<dyn ShapefileConverter>) -> Self {
        Self {
            converter,
            scratch_dir: std::env::temp_dir(),
        }
    }

    /// Write intermediate GeoJSON files under `dir` instead of the system
    /// temp directory.
    pub fn with_scratch_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.scratch_dir = dir.into();
        self
    }

    /// Read `file` into a layer.
    pub async fn load(&self, file: &Path) -> GeoResult<Layer> {
        let format = ImportFormat::from_path(file)?;
        if !tokio::fs::try_exists(file).await.unwrap_or(false) {
            return Err(GeoError::BadRequest(format!(
                "file not found: {}",
                file.display()
            )));
        }

        match format {
            ImportFormat::GeoJson => read_geojson(file).await,
            ImportFormat::Shapefile => {
                let scratch = self
                    .scratch_dir
                    .join(format!("geolayer-import-{}.geojson", new_datasource_id()));

                let result = match self.converter.convert(file, &scratch).await {
                    Ok(()) => read_geojson(&scratch).await,
                    Err(e) => Err(e),
                };

                if let Err(e) = tokio::fs::remove_file(&scratch).await {
                    if e.kind() != std::io::ErrorKind::NotFound {
                        tracing::warn!(path = %scratch.display(), error = %e, "Failed to remove conversion output");
                    }
                }
                result
            }
        }
    }
}

async fn read_geojson(path: &Path) -> GeoResult<Layer> {
    let bytes = tokio::fs::read(path).await.map_err(|e| {
        GeoError::BadRequest(format!("cannot read {}: {}", path.display(), e))
    })?;
    let value: serde_json::Value = serde_json::from_slice(&bytes).map_err(|e| {
        GeoError::BadRequest(format!("invalid GeoJSON in {}: {}", path.display(), e))
    })?;
    Layer::from_value(value)
}
