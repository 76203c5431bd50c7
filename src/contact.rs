use serde::Serialize;

/// A single contact as stored in the `people` table.
///
/// `id <= 0` marks a contact that has not been saved yet; storage assigns the
/// id on first save.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Contact {
    pub id: i64,
    pub first_name: String,
    pub last_name: String,
    pub comment: String,
}

impl Contact {
    pub fn new(
        first_name: impl Into<String>,
        last_name: impl Into<String>,
        comment: impl Into<String>,
    ) -> Self {
        Self {
            id: 0,
            first_name: first_name.into(),
            last_name: last_name.into(),
            comment: comment.into(),
        }
    }

    pub fn with_id(mut self, id: i64) -> Self {
        self.id = id;
        self
    }

    pub fn is_persisted(&self) -> bool {
        self.id > 0
    }

    /// Flat string form in column order: id, first name, last name, comment.
    /// Used for both display and search.
    pub fn to_strings(&self) -> Vec<String> {
        vec![
            self.id.to_string(),
            self.first_name.clone(),
            self.last_name.clone(),
            self.comment.clone(),
        ]
    }
}

pub fn contacts_to_strings(contacts: &[Contact]) -> Vec<Vec<String>> {
    contacts.iter().map(Contact::to_strings).collect()
}

/// Table column label plus visibility flag.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Header {
    pub text: String,
    pub display: bool,
}

impl Header {
    pub fn new(text: impl Into<String>, display: bool) -> Self {
        Self {
            text: text.into(),
            display,
        }
    }
}

pub const HEADER_LABELS: [&str; 4] = ["ID", "First name", "Last name", "Comment"];

pub fn default_headers() -> Vec<Header> {
    HEADER_LABELS
        .iter()
        .map(|label| Header::new(*label, true))
        .collect()
}

pub fn headers_to_text(headers: &[Header], display_only: bool) -> Vec<&str> {
    headers
        .iter()
        .filter(|header| header.display || !display_only)
        .map(|header| header.text.as_str())
        .collect()
}

/// Indices into `Contact::to_strings` for the displayed headers.
pub fn visible_columns(headers: &[Header]) -> Vec<usize> {
    headers
        .iter()
        .enumerate()
        .filter(|(_, header)| header.display)
        .map(|(idx, _)| idx)
        .collect()
}
