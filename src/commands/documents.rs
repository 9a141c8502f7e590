use super::{CommandError, CommandResult};
use crate::api::rejected;
use crate::http::FilePart;
use crate::state::AppState;
use crate::types::DocumentInfo;
use std::fmt;
use std::path::Path;
use std::sync::{Mutex, PoisonError};

pub const UPLOAD_FIELD: &str = "file";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileKind {
    Pdf,
    Word,
    Text,
    Slides,
    Sheet,
    Other,
}

impl FileKind {
    pub fn from_filename(filename: &str) -> Self {
        match extension(filename).as_deref() {
            Some("pdf") => FileKind::Pdf,
            Some("doc" | "docx") => FileKind::Word,
            Some("txt") => FileKind::Text,
            Some("ppt" | "pptx") => FileKind::Slides,
            Some("xls" | "xlsx") => FileKind::Sheet,
            _ => FileKind::Other,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            FileKind::Pdf => "PDF",
            FileKind::Word => "Word",
            FileKind::Text => "Text",
            FileKind::Slides => "Slides",
            FileKind::Sheet => "Sheet",
            FileKind::Other => "File",
        }
    }
}

impl fmt::Display for FileKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

fn extension(filename: &str) -> Option<String> {
    let (_, ext) = filename.rsplit_once('.')?;
    Some(ext.to_ascii_lowercase())
}

pub fn is_supported_upload(filename: &str) -> bool {
    matches!(extension(filename).as_deref(), Some("pdf" | "docx"))
}

pub fn filter_documents<'a>(documents: &'a [DocumentInfo], query: &str) -> Vec<&'a DocumentInfo> {
    let needle = query.trim().to_lowercase();
    documents
        .iter()
        .filter(|d| needle.is_empty() || d.filename.to_lowercase().contains(&needle))
        .collect()
}

#[derive(Debug, Default)]
struct Listing {
    documents: Vec<DocumentInfo>,
    total_count: u32,
}

pub struct DocumentsController {
    state: AppState,
    listing: Mutex<Listing>,
}

impl DocumentsController {
    pub fn new(state: AppState) -> Self {
        Self {
            state,
            listing: Mutex::new(Listing::default()),
        }
    }

    pub fn documents(&self) -> Vec<DocumentInfo> {
        self.listing
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .documents
            .clone()
    }

    pub fn total_count(&self) -> u32 {
        self.listing
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .total_count
    }

    pub fn filtered(&self, query: &str) -> Vec<DocumentInfo> {
        let documents = self.documents();
        filter_documents(&documents, query)
            .into_iter()
            .cloned()
            .collect()
    }

    pub async fn refresh(&self) -> CommandResult<Vec<DocumentInfo>> {
        self.refresh_page(self.state.documents_page_size(), 0).await
    }

    pub async fn refresh_page(&self, limit: u32, offset: u32) -> CommandResult<Vec<DocumentInfo>> {
        let res = self
            .state
            .api
            .list_documents(limit.clamp(1, 100), offset)
            .await?;
        if !res.success {
            return Err(rejected(&res.message, "Could not load documents.").into());
        }
        let mut listing = self.listing.lock().unwrap_or_else(PoisonError::into_inner);
        listing.documents = res.documents;
        listing.total_count = res.total_count;
        Ok(listing.documents.clone())
    }

    pub async fn upload(&self, path: &Path) -> CommandResult<Option<DocumentInfo>> {
        let file_name = path
            .file_name()
            .and_then(|n| n.to_str())
            .ok_or(CommandError::Validation("Please choose a file to upload."))?
            .to_string();
        if !is_supported_upload(&file_name) {
            return Err(CommandError::Validation(
                "Only PDF and DOCX files are supported.",
            ));
        }
        let bytes = tokio::fs::read(path)
            .await
            .map_err(|source| CommandError::File {
                path: path.to_path_buf(),
                source,
            })?;

        let file = FilePart {
            field: UPLOAD_FIELD.to_string(),
            mime: mime_guess::from_path(&file_name)
                .first_or_octet_stream()
                .to_string(),
            file_name,
            bytes,
        };
        let res = self.state.api.add_document(file).await?;
        if !res.success {
            return Err(rejected(&res.message, "Upload failed.").into());
        }
        tracing::info!(path = %path.display(), "document uploaded");
        self.refresh().await?;
        Ok(res.document_info)
    }

    pub async fn delete(&self, document_id: &str) -> CommandResult<()> {
        let document_id = document_id.trim();
        if document_id.is_empty() {
            return Err(CommandError::Validation("Document id is required."));
        }
        let res = self.state.api.delete_document(document_id).await?;
        if !res.success {
            return Err(rejected(&res.message, "Delete failed.").into());
        }
        self.refresh().await?;
        Ok(())
    }
}
