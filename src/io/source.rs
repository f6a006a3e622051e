use anyhow::{Result, anyhow, bail};
use std::path::{Path, PathBuf};
use url::Url;

use crate::formats::Format;

/// A local source file whose existence has been checked
#[derive(Debug, Clone)]
pub struct SourceFile {
    path: PathBuf,
    format: Format,
}

impl SourceFile {
    /// Resolve the `--url` argument into a local file.
    ///
    /// Accepts plain paths and `file://` URIs. Fails if the file does not exist,
    /// before anything else touches the file or the database.
    pub fn resolve(uri: &str) -> Result<Self> {
        let path = Self::parse_path(uri)?;

        if !path.exists() {
            bail!("Local file not found: {}", uri);
        }

        let format = Format::detect(&path);
        Ok(Self { path, format })
    }

    fn parse_path(uri: &str) -> Result<PathBuf> {
        // Without "://" a colon belongs to the path ("C:\\trips.csv", "trips:2021.csv")
        match Url::parse(uri) {
            Ok(url) if url.scheme() == "file" => url
                .to_file_path()
                .map_err(|_| anyhow!("Invalid file:// URI: {}", uri)),
            Ok(url) if uri.contains("://") => Err(anyhow!(
                "Unsupported URI scheme '{}': only local files can be ingested",
                url.scheme()
            )),
            _ => Ok(PathBuf::from(uri)),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn format(&self) -> Format {
        self.format
    }
}
