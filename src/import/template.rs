//! Plain-text template documents on the local filesystem

use async_trait::async_trait;
use std::path::PathBuf;

use super::{DocumentTemplater, ImportError};

/// Copies a UTF-8 template into `output_dir`, one file per imported contact
#[derive(Debug, Clone)]
pub struct FileTemplater {
    template_path: PathBuf,
    output_dir: PathBuf,
}

impl FileTemplater {
    pub fn new(template_path: impl Into<PathBuf>, output_dir: impl Into<PathBuf>) -> Self {
        Self {
            template_path: template_path.into(),
            output_dir: output_dir.into(),
        }
    }
}

/// Replace every occurrence of each placeholder
pub fn fill_template(template: &str, values: &[(&'static str, String)]) -> String {
    values
        .iter()
        .fold(template.to_string(), |text, (placeholder, value)| {
            text.replace(placeholder, value)
        })
}

/// File name for `document_name`; anything outside `[A-Za-z0-9 ._-]` becomes `_`
pub fn file_safe_name(document_name: &str) -> String {
    document_name
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, ' ' | '.' | '_' | '-') {
                c
            } else {
                '_'
            }
        })
        .collect()
}

#[async_trait]
impl DocumentTemplater for FileTemplater {
    async fn create_from_template(
        &self,
        document_name: &str,
        values: &[(&'static str, String)],
    ) -> Result<String, ImportError> {
        let template = tokio::fs::read_to_string(&self.template_path)
            .await
            .map_err(|e| {
                ImportError::Template(format!(
                    "Failed to read template {:?}: {}",
                    self.template_path, e
                ))
            })?;

        tokio::fs::create_dir_all(&self.output_dir).await?;

        let path = self
            .output_dir
            .join(format!("{}.txt", file_safe_name(document_name)));
        tokio::fs::write(&path, fill_template(&template, values)).await?;

        log::debug!("Wrote {} substitutions to {:?}", values.len(), path);

        Ok(path.to_string_lossy().into_owned())
    }
}
