use crossterm::event::{Event, KeyEvent};
use tui_input::backend::crossterm::EventHandler;
use tui_input::Input;

pub const SEARCH_PLACEHOLDER: &str = "Search";

/// Single-line search input that reports text changes.
#[derive(Debug, Default)]
pub struct SearchBox {
    input: Input,
    reported: String,
}

impl SearchBox {
    pub fn value(&self) -> &str {
        self.input.value()
    }

    pub fn visual_cursor(&self) -> usize {
        self.input.visual_cursor()
    }

    /// Feed a key to the input. Returns the new text only when it differs
    /// from the last text reported, so cursor movement does not re-filter.
    pub fn handle_key_event(&mut self, key: KeyEvent) -> Option<String> {
        self.input.handle_event(&Event::Key(key));
        self.take_change()
    }

    pub fn clear(&mut self) -> Option<String> {
        self.input.reset();
        self.take_change()
    }

    fn take_change(&mut self) -> Option<String> {
        if self.input.value() == self.reported {
            return None;
        }
        self.reported = self.input.value().to_string();
        Some(self.reported.clone())
    }
}
