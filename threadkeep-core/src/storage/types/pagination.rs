//! Cursor pagination and thread filtering
//!
//! Listing works on an already-materialised, ordered list: filter it, then
//! slice it starting after the cursor.

use serde::{Deserialize, Serialize};

use super::thread::ThreadDict;
use crate::storage::ids::UserId;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Pagination {
    /// Page size
    pub first: usize,
    /// Id of the last item of the previous page
    #[serde(default)]
    pub cursor: Option<String>,
}

impl Pagination {
    pub fn first(first: usize) -> Self {
        Self { first, cursor: None }
    }

    pub fn after(mut self, cursor: impl Into<String>) -> Self {
        self.cursor = Some(cursor.into());
        self
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ThreadFilter {
    #[serde(default)]
    pub user_id: Option<UserId>,
    /// Case-insensitive keyword matched against step outputs
    #[serde(default)]
    pub search: Option<String>,
    /// Feedback value some step of the thread must carry; 0 is no filter
    #[serde(default)]
    pub feedback: Option<i64>,
}

impl ThreadFilter {
    pub fn for_user(user_id: UserId) -> Self {
        Self {
            user_id: Some(user_id),
            ..Self::default()
        }
    }

    pub fn search(mut self, keyword: impl Into<String>) -> Self {
        self.search = Some(keyword.into());
        self
    }

    pub fn feedback(mut self, value: i64) -> Self {
        self.feedback = Some(value);
        self
    }

    /// Whether a thread passes the keyword and feedback conditions
    pub fn matches(&self, thread: &ThreadDict) -> bool {
        let keyword_match = match self.search.as_deref() {
            Some(keyword) if !keyword.is_empty() => {
                let keyword = keyword.to_lowercase();
                thread
                    .steps
                    .iter()
                    .any(|step| step.output.to_lowercase().contains(&keyword))
            }
            _ => true,
        };

        let feedback_match = match self.feedback {
            Some(value) if value != 0 => thread
                .steps
                .iter()
                .any(|step| step.feedback.as_ref().is_some_and(|f| f.value == value)),
            _ => true,
        };

        keyword_match && feedback_match
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PageInfo {
    pub has_next_page: bool,
    pub start_cursor: Option<String>,
    pub end_cursor: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaginatedResponse<T> {
    pub page_info: PageInfo,
    pub data: Vec<T>,
}

/// Slice `items` into one page.
///
/// The page starts right after the item whose id equals the cursor, or at the
/// beginning when there is no cursor or it is not found.
pub fn paginate<T, F>(items: Vec<T>, pagination: &Pagination, id_of: F) -> PaginatedResponse<T>
where
    F: Fn(&T) -> &str,
{
    let start = pagination
        .cursor
        .as_deref()
        .and_then(|cursor| items.iter().position(|item| id_of(item) == cursor))
        .map(|index| index + 1)
        .unwrap_or(0);
    let end = start.saturating_add(pagination.first);
    let has_next_page = items.len() > end;

    let data: Vec<T> = items
        .into_iter()
        .skip(start)
        .take(pagination.first)
        .collect();

    let start_cursor = data.first().map(|item| id_of(item).to_string());
    let end_cursor = data.last().map(|item| id_of(item).to_string());

    PaginatedResponse {
        page_info: PageInfo {
            has_next_page,
            start_cursor,
            end_cursor,
        },
        data,
    }
}
