/// Focusable areas of the main window
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Pane {
    /// Search input above the table
    Search,
    /// Contact table
    Table,
}

impl Pane {
    pub fn title(self) -> &'static str {
        match self {
            Pane::Search => "SEARCH",
            Pane::Table => "CONTACTS",
        }
    }

    pub fn toggle(self) -> Self {
        match self {
            Pane::Search => Pane::Table,
            Pane::Table => Pane::Search,
        }
    }
}
