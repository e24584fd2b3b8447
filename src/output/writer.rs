// ABOUTME: Output writers for result destinations (stdout, files)
// ABOUTME: Handles writing formatted results where the user asked for them

use async_trait::async_trait;
use std::path::Path;
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tracing::{debug, info};

use super::error::{OutputError, Result};

#[async_trait]
pub trait OutputWriter: Send + Sync {
    async fn write(&self, content: &str) -> Result<()>;
}

pub struct StdoutWriter;

pub struct FileWriter {
    path: String,
    create_dirs: bool,
}

impl StdoutWriter {
    pub fn new() -> Self {
        Self
    }
}

impl Default for StdoutWriter {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl OutputWriter for StdoutWriter {
    async fn write(&self, content: &str) -> Result<()> {
        let mut stdout = tokio::io::stdout();
        stdout.write_all(content.as_bytes()).await?;
        if !content.ends_with('\n') {
            stdout.write_all(b"\n").await?;
        }
        stdout.flush().await?;

        debug!("Output written to stdout ({} chars)", content.len());
        Ok(())
    }
}

impl FileWriter {
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().display().to_string(),
            create_dirs: true,
        }
    }

    pub fn with_create_dirs(mut self, create_dirs: bool) -> Self {
        self.create_dirs = create_dirs;
        self
    }

    fn write_error(&self, e: impl std::fmt::Display) -> OutputError {
        OutputError::WriteError {
            path: self.path.clone(),
            message: e.to_string(),
        }
    }
}

#[async_trait]
impl OutputWriter for FileWriter {
    async fn write(&self, content: &str) -> Result<()> {
        let output_path = Path::new(&self.path);

        if self.create_dirs {
            if let Some(parent) = output_path.parent().filter(|p| !p.as_os_str().is_empty()) {
                fs::create_dir_all(parent)
                    .await
                    .map_err(|e| self.write_error(e))?;
            }
        }

        fs::write(output_path, content)
            .await
            .map_err(|e| self.write_error(e))?;

        info!("Result written to {}", self.path);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_file_writer_creates_parent_dirs() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("results/deploy.json");

        FileWriter::new(&path).write("{}").await.unwrap();

        assert_eq!(std::fs::read_to_string(&path).unwrap(), "{}");
    }

    #[tokio::test]
    async fn test_file_writer_without_create_dirs_fails() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("missing/deploy.json");

        let err = FileWriter::new(&path)
            .with_create_dirs(false)
            .write("{}")
            .await
            .unwrap_err();
        assert!(matches!(err, OutputError::WriteError { .. }));
    }
}
