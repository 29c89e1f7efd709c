/// Quota-bounded per-project file storage
///
/// Every project id and file name crosses the sanitization gate before any
/// filesystem call. Quotas are abuse guards, not hard invariants: the count
/// check and the write are not transactional, so two concurrent creates may
/// both pass the check and land one file over quota.
use crate::sanitize;
use crate::types::{FileUpload, GovernanceError, Result, StoredFile};
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

/// Store configuration
#[derive(Debug, Clone)]
pub struct StoreConfig {
    /// Directory holding one subdirectory per project
    pub base_dir: PathBuf,
    /// Maximum accepted content size in bytes
    pub max_file_size: u64,
    /// Maximum stored files per project (counting the configured extension)
    pub max_files_per_project: usize,
    /// Extension appended to every stored file
    pub extension: String,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            base_dir: std::env::temp_dir().join("tenantbox-store"),
            max_file_size: 1024 * 1024,
            max_files_per_project: 20,
            extension: "json".to_string(),
        }
    }
}

pub struct ScopedFileStore {
    config: StoreConfig,
}

impl ScopedFileStore {
    pub fn new(config: StoreConfig) -> Self {
        Self { config }
    }

    fn project_dir(&self, project_id: &str) -> PathBuf {
        self.config.base_dir.join(project_id)
    }

    fn file_path(&self, project_id: &str, file_name: &str) -> PathBuf {
        self.project_dir(project_id)
            .join(format!("{}.{}", file_name, self.config.extension))
    }

    /// Count stored files of the configured extension in one project.
    /// An absent project directory counts as zero, not as an error.
    pub fn file_count(&self, project_id: &str) -> Result<usize> {
        sanitize::sanitize_project_id(project_id)?;

        let dir = self.project_dir(project_id);
        let entries = match fs::read_dir(&dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(0),
            Err(e) => return Err(e.into()),
        };

        let mut count = 0;
        for entry in entries {
            let entry = entry?;
            if entry.path().extension().and_then(|e| e.to_str())
                == Some(self.config.extension.as_str())
            {
                count += 1;
            }
        }
        Ok(count)
    }

    /// Validate, quota-check, and write one file. Re-writing an existing
    /// name overwrites it without consuming quota.
    pub fn create_file(&self, upload: &FileUpload) -> Result<StoredFile> {
        sanitize::sanitize_project_id(&upload.project_id)?;
        let file_name = sanitize::validate_and_decode_file_name(&upload.file_name)?;

        let size = upload.content.len() as u64;
        if size > self.config.max_file_size {
            return Err(GovernanceError::Quota(format!(
                "file size {} exceeds limit of {} bytes",
                size, self.config.max_file_size
            )));
        }

        let path = self.file_path(&upload.project_id, &file_name);
        if !path.exists() && self.file_count(&upload.project_id)? >= self.config.max_files_per_project
        {
            return Err(GovernanceError::Quota(format!(
                "project {} already holds {} files",
                upload.project_id, self.config.max_files_per_project
            )));
        }

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&path, &upload.content)?;

        Ok(StoredFile {
            project_id: upload.project_id.clone(),
            file_name,
            size,
            path,
        })
    }

    /// Read one file back. Absence is a valid negative result, not an
    /// error; any other I/O failure propagates.
    pub fn get_file_content(&self, project_id: &str, file_name: &str) -> Result<Option<String>> {
        sanitize::sanitize_project_id(project_id)?;
        let file_name = sanitize::validate_and_decode_file_name(file_name)?;

        match fs::read_to_string(self.file_path(project_id, &file_name)) {
            Ok(content) => Ok(Some(content)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    /// Explicitly remove one file. Returns whether anything was deleted.
    pub fn remove_file(&self, project_id: &str, file_name: &str) -> Result<bool> {
        sanitize::sanitize_project_id(project_id)?;
        let file_name = sanitize::validate_and_decode_file_name(file_name)?;

        match fs::remove_file(self.file_path(project_id, &file_name)) {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e.into()),
        }
    }

    pub fn base_dir(&self) -> &Path {
        &self.config.base_dir
    }
}
