//! Contract for turning a [`ProposalDocument`] into deliverable bytes.

use async_trait::async_trait;
use thiserror::Error;

use crate::domain::proposal::ProposalDocument;

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum RenderedDocument {
    Pdf(Vec<u8>),
    Html(String),
}

impl RenderedDocument {
    pub fn content_type(&self) -> &'static str {
        match self {
            Self::Pdf(_) => "application/pdf",
            Self::Html(_) => "text/html; charset=utf-8",
        }
    }

    pub fn extension(&self) -> &'static str {
        match self {
            Self::Pdf(_) => "pdf",
            Self::Html(_) => "html",
        }
    }

    pub fn into_bytes(self) -> Vec<u8> {
        match self {
            Self::Pdf(bytes) => bytes,
            Self::Html(html) => html.into_bytes(),
        }
    }
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum RenderError {
    #[error("template error: {0}")]
    Template(String),
    #[error("pdf conversion failed: {0}")]
    Conversion(String),
    #[error("io error: {0}")]
    Io(String),
}

#[async_trait]
pub trait DocumentRenderer: Send + Sync {
    async fn render(&self, document: &ProposalDocument) -> Result<RenderedDocument, RenderError>;
}
