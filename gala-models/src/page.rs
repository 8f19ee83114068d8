//! Paginated document sets and page requests.

use serde::{Deserialize, Serialize};

use gala_core::error::{GalaError, GalaResult};

/// A page of documents as returned by the server.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Page<T> {
    #[serde(default = "Vec::new")]
    pub documents: Vec<T>,
    pub total_pages: u32,
    pub current_page: u32,
    pub has_more: bool,
}

/// Page position requested from the server. Pages are 1-based.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PageRequest {
    pub page_number: u32,
    pub page_size: u32,
}

impl PageRequest {
    /// Create a validated page request.
    pub fn new(page_number: u32, page_size: u32) -> GalaResult<Self> {
        let request = Self {
            page_number,
            page_size,
        };
        request.validate()?;
        Ok(request)
    }

    /// First page of the given size.
    pub fn first(page_size: u32) -> GalaResult<Self> {
        Self::new(1, page_size)
    }

    /// The page after this one.
    pub fn next(&self) -> Self {
        Self {
            page_number: self.page_number.saturating_add(1),
            page_size: self.page_size,
        }
    }

    /// pageNumber >= 1 and pageSize > 0.
    pub fn validate(&self) -> GalaResult<()> {
        if self.page_number < 1 {
            return Err(GalaError::InvalidRequest("pageNumber must be >= 1".into()));
        }
        if self.page_size == 0 {
            return Err(GalaError::InvalidRequest("pageSize must be > 0".into()));
        }
        Ok(())
    }
}
