use serde::Serialize;

pub const DEFAULT_PAGE_SIZE: usize = 20;

// ============================================================================
// Pagination
// ============================================================================

/// Zero-based page request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Pageable {
    pub page: usize,
    pub size: usize,
}

impl Default for Pageable {
    fn default() -> Self {
        Self { page: 0, size: DEFAULT_PAGE_SIZE }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Page<T> {
    pub content: Vec<T>,
    pub number: usize,
    pub size: usize,
    pub number_of_elements: usize,
    pub total_elements: usize,
    pub total_pages: usize,
}

impl<T> Page<T> {
    /// Cuts one page out of an already filtered and sorted list.
    /// `pageable.size` must be positive.
    pub fn from_vec(items: Vec<T>, pageable: Pageable) -> Self {
        let total_elements = items.len();
        let size = pageable.size.max(1);
        let total_pages = total_elements.div_ceil(size);

        let content: Vec<T> = items
            .into_iter()
            .skip(pageable.page.saturating_mul(size))
            .take(size)
            .collect();

        Self {
            number_of_elements: content.len(),
            content,
            number: pageable.page,
            size,
            total_elements,
            total_pages,
        }
    }
}
