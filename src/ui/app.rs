use std::io::stdout;
use std::time::Duration;

use anyhow::Result;
use crossterm::event::{self, Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers};
use crossterm::terminal::{
    disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen, SetTitle,
};
use crossterm::ExecutableCommand;
use ratatui::backend::CrosstermBackend;
use ratatui::Terminal;
use tracing::info;
use tui_widgets::popup::PopupState;

use crate::config::{Config, UiColors};
use crate::db::Database;

use super::draw;
use super::edit::{EditForm, FormField};
use super::panes::Pane;
use super::search_box::SearchBox;
use super::table::ContactTable;

const WINDOW_TITLE: &str = "Contacts";
const PAGE_SIZE: isize = 10;

/// Help modal state with scroll support
#[derive(Debug, Clone)]
pub struct HelpModal {
    pub scroll: usize,
    pub total_lines: usize,
    /// Set during rendering
    pub viewport_height: usize,
}

impl HelpModal {
    pub fn new(total_lines: usize) -> Self {
        Self {
            scroll: 0,
            total_lines,
            viewport_height: 10,
        }
    }

    pub fn scroll_down(&mut self, lines: usize) {
        let max_scroll = self.total_lines.saturating_sub(self.viewport_height);
        self.scroll = (self.scroll + lines).min(max_scroll);
    }

    pub fn scroll_up(&mut self, lines: usize) {
        self.scroll = self.scroll.saturating_sub(lines);
    }
}

/// A section in the help modal (e.g., "Global", "Table")
pub struct HelpSection {
    pub title: &'static str,
    pub entries: Vec<HelpEntry>,
}

/// A single help entry (action name + key bindings)
pub struct HelpEntry {
    pub action: &'static str,
    pub keys: String,
}

pub struct App<'a> {
    db: &'a mut Database,
    config: &'a Config,
    pub table: ContactTable,
    pub search: SearchBox,
    pub focus: Pane,
    pub form: Option<EditForm>,
    pub help_modal: Option<HelpModal>,
    // Popup state shared by the form and help modals (only one is open at a time)
    pub modal_popup: PopupState,
    pub status: Option<String>,
}

impl<'a> App<'a> {
    pub fn new(db: &'a mut Database, config: &'a Config) -> Result<Self> {
        let (headers, contacts) = db.list()?;
        let headers = config.table.apply(headers);
        info!(count = contacts.len(), "loaded contacts");

        Ok(Self {
            db,
            config,
            table: ContactTable::new(headers, contacts),
            search: SearchBox::default(),
            focus: Pane::Table,
            form: None,
            help_modal: None,
            modal_popup: PopupState::default(),
            status: None,
        })
    }

    pub fn run(&mut self) -> Result<()> {
        enable_raw_mode()?;
        let mut stdout = stdout();
        stdout.execute(EnterAlternateScreen)?;
        stdout.execute(SetTitle(WINDOW_TITLE))?;
        let backend = CrosstermBackend::new(stdout);
        let mut terminal = Terminal::new(backend)?;
        terminal.clear()?;

        let result = self.event_loop(&mut terminal);

        disable_raw_mode()?;
        terminal.backend_mut().execute(LeaveAlternateScreen)?;
        terminal.show_cursor()?;

        result
    }

    fn event_loop<B>(&mut self, terminal: &mut Terminal<B>) -> Result<()>
    where
        B: ratatui::backend::Backend,
    {
        loop {
            draw::render(terminal, self)?;

            if event::poll(Duration::from_millis(250))? {
                match event::read()? {
                    Event::Key(key) if key.kind != KeyEventKind::Release => {
                        if self.handle_key(key)? {
                            break;
                        }
                    }
                    _ => {}
                }
            }
        }
        Ok(())
    }

    /// Route one key press. Returns `true` when the app should exit.
    pub fn handle_key(&mut self, key: KeyEvent) -> Result<bool> {
        // Ctrl+C always quits
        if key.modifiers.contains(KeyModifiers::CONTROL)
            && matches!(key.code, KeyCode::Char('c') | KeyCode::Char('C'))
        {
            return Ok(true);
        }

        if self.help_modal.is_some() {
            self.handle_help_modal_key(key);
            return Ok(false);
        }

        if self.form.is_some() {
            self.handle_form_key(key)?;
            return Ok(false);
        }

        match self.focus {
            Pane::Search => {
                self.handle_search_key(key);
                Ok(false)
            }
            Pane::Table => Ok(self.handle_table_key(key)),
        }
    }

    fn handle_search_key(&mut self, key: KeyEvent) {
        let global = &self.config.keys.global;

        // Printable keys belong to the input; only named keys act as shortcuts here.
        if !is_char_key(&key) {
            if key_matches_any(&key, &global.add) {
                self.open_add_form();
                return;
            }
            if key_matches_any(&key, &global.help) {
                self.show_help();
                return;
            }
        }

        match key.code {
            KeyCode::Esc | KeyCode::Enter | KeyCode::Tab | KeyCode::BackTab | KeyCode::Down => {
                self.focus = Pane::Table;
                return;
            }
            _ => {}
        }

        if let Some(text) = self.search.handle_key_event(key) {
            self.table.set_filter(&text);
        }
    }

    fn handle_table_key(&mut self, key: KeyEvent) -> bool {
        let global = &self.config.keys.global;
        let table_keys = &self.config.keys.table;

        if key_matches_any(&key, &global.quit) {
            return true;
        }
        if key_matches_any(&key, &global.search) {
            self.focus = Pane::Search;
            return false;
        }
        if key_matches_any(&key, &global.add) {
            self.open_add_form();
            return false;
        }
        if key_matches_any(&key, &global.help) {
            self.show_help();
            return false;
        }

        if key_matches_any(&key, &table_keys.next) {
            self.table.select_next();
        } else if key_matches_any(&key, &table_keys.prev) {
            self.table.select_prev();
        } else if key_matches_any(&key, &table_keys.page_down) {
            self.table.page(PAGE_SIZE);
        } else if key_matches_any(&key, &table_keys.page_up) {
            self.table.page(-PAGE_SIZE);
        } else if key_matches_any(&key, &table_keys.first) {
            self.table.select_first();
        } else if key_matches_any(&key, &table_keys.last) {
            self.table.select_last();
        } else if key_matches_any(&key, &table_keys.edit) {
            self.open_edit_form();
        } else if matches!(key.code, KeyCode::Tab | KeyCode::BackTab) {
            self.focus = self.focus.toggle();
        } else if key.code == KeyCode::Esc {
            if let Some(text) = self.search.clear() {
                self.table.set_filter(&text);
                self.set_status("Search cleared");
            }
        }
        false
    }

    fn handle_form_key(&mut self, key: KeyEvent) -> Result<()> {
        let form_keys = &self.config.keys.form;
        let Some(form) = self.form.as_mut() else {
            return Ok(());
        };

        if key_matches_any(&key, &form_keys.cancel) {
            self.form = None;
            self.set_status("Cancelled");
            return Ok(());
        }

        if key_matches_any(&key, &form_keys.save) {
            if form.focus() == FormField::Save {
                return self.submit_form();
            }
            form.focus_next();
            return Ok(());
        }

        if key_matches_any(&key, &form_keys.next) {
            form.focus_next();
        } else if key_matches_any(&key, &form_keys.prev) {
            form.focus_prev();
        } else {
            form.handle_key_event(key);
        }
        Ok(())
    }

    fn open_add_form(&mut self) {
        self.modal_popup = PopupState::default();
        self.form = Some(EditForm::blank());
        self.set_status("Add contact");
    }

    fn open_edit_form(&mut self) {
        let Some(contact) = self.table.selected_contact().cloned() else {
            self.set_status("No contact selected");
            return;
        };
        info!(id = contact.id, "editing contact");
        self.modal_popup = PopupState::default();
        self.form = Some(EditForm::from_contact(&contact));
        self.set_status(format!("Edit contact {}", contact.id));
    }

    /// Persist the open form, then mirror the change into the table.
    /// A storage failure ends the app.
    fn submit_form(&mut self) -> Result<()> {
        let Some(form) = self.form.take() else {
            return Ok(());
        };
        let mut contact = form.to_contact();
        let id = self.db.save(&contact)?;
        contact.id = id;

        if form.is_new() {
            self.table.add(contact);
            self.table.select_id(id);
            self.set_status(format!("Added contact {}", id));
        } else {
            self.table.update(contact);
            self.set_status(format!("Saved contact {}", id));
        }
        Ok(())
    }

    fn set_status<S: Into<String>>(&mut self, message: S) {
        self.status = Some(message.into());
    }

    pub fn ui_colors(&self) -> &UiColors {
        &self.config.ui.colors
    }

    pub fn help_entries(&self) -> Vec<HelpSection> {
        let keys = &self.config.keys;
        vec![
            HelpSection {
                title: "GLOBAL",
                entries: vec![
                    HelpEntry { action: "Quit", keys: format!("Ctrl+C, {}", keys.global.quit.join(", ")) },
                    HelpEntry { action: "Search", keys: keys.global.search.join(", ") },
                    HelpEntry { action: "Add contact", keys: keys.global.add.join(", ") },
                    HelpEntry { action: "Help", keys: keys.global.help.join(", ") },
                ],
            },
            HelpSection {
                title: "TABLE",
                entries: vec![
                    HelpEntry { action: "Next row", keys: keys.table.next.join(", ") },
                    HelpEntry { action: "Previous row", keys: keys.table.prev.join(", ") },
                    HelpEntry { action: "Page down", keys: keys.table.page_down.join(", ") },
                    HelpEntry { action: "Page up", keys: keys.table.page_up.join(", ") },
                    HelpEntry { action: "First row", keys: keys.table.first.join(", ") },
                    HelpEntry { action: "Last row", keys: keys.table.last.join(", ") },
                    HelpEntry { action: "Edit contact", keys: keys.table.edit.join(", ") },
                    HelpEntry { action: "Switch pane", keys: "Tab".to_string() },
                    HelpEntry { action: "Clear search", keys: "Esc".to_string() },
                ],
            },
            HelpSection {
                title: "FORM",
                entries: vec![
                    HelpEntry { action: "Next field", keys: keys.form.next.join(", ") },
                    HelpEntry { action: "Previous field", keys: keys.form.prev.join(", ") },
                    HelpEntry { action: "Next / Save", keys: keys.form.save.join(", ") },
                    HelpEntry { action: "Cancel", keys: keys.form.cancel.join(", ") },
                ],
            },
        ]
    }

    fn help_total_lines(&self) -> usize {
        let sections = self.help_entries();
        // title + entries + blank line between sections
        sections.iter().map(|s| s.entries.len() + 2).sum::<usize>().saturating_sub(1)
    }

    pub fn show_help(&mut self) {
        self.modal_popup = PopupState::default();
        self.help_modal = Some(HelpModal::new(self.help_total_lines()));
    }

    fn handle_help_modal_key(&mut self, key: KeyEvent) {
        let Some(modal) = self.help_modal.as_mut() else {
            return;
        };
        match key.code {
            KeyCode::Char('j') | KeyCode::Down => modal.scroll_down(1),
            KeyCode::Char('k') | KeyCode::Up => modal.scroll_up(1),
            KeyCode::PageDown => modal.scroll_down(PAGE_SIZE as usize),
            KeyCode::PageUp => modal.scroll_up(PAGE_SIZE as usize),
            _ => {
                if matches!(key.code, KeyCode::Esc | KeyCode::Char('q'))
                    || key_matches_any(&key, &self.config.keys.global.help)
                {
                    self.help_modal = None;
                }
            }
        }
    }
}

fn is_char_key(event: &KeyEvent) -> bool {
    matches!(event.code, KeyCode::Char(_))
}

fn key_matches_any(event: &KeyEvent, bindings: &[String]) -> bool {
    bindings.iter().any(|b| key_matches_single(event, b))
}

/// Check if the key event matches a single binding string
fn key_matches_single(event: &KeyEvent, binding: &str) -> bool {
    let trimmed = binding.trim();
    if trimmed.is_empty() {
        return false;
    }

    // Ctrl/Alt/Super combinations are never bound
    let disallowed = KeyModifiers::CONTROL | KeyModifiers::ALT | KeyModifiers::SUPER;
    if event.modifiers.intersects(disallowed) {
        return false;
    }

    match trimmed.to_ascii_lowercase().as_str() {
        "enter" => matches!(event.code, KeyCode::Enter),
        "tab" => matches!(event.code, KeyCode::Tab),
        "backtab" | "shift+tab" => matches!(event.code, KeyCode::BackTab),
        "backspace" => matches!(event.code, KeyCode::Backspace),
        "esc" | "escape" => matches!(event.code, KeyCode::Esc),
        "space" => matches!(event.code, KeyCode::Char(' ')),
        "up" => matches!(event.code, KeyCode::Up),
        "down" => matches!(event.code, KeyCode::Down),
        "left" => matches!(event.code, KeyCode::Left),
        "right" => matches!(event.code, KeyCode::Right),
        "pageup" | "page_up" => matches!(event.code, KeyCode::PageUp),
        "pagedown" | "page_down" => matches!(event.code, KeyCode::PageDown),
        "home" => matches!(event.code, KeyCode::Home),
        "end" => matches!(event.code, KeyCode::End),
        lower if lower.len() >= 2 && lower.starts_with('f') && lower[1..].chars().all(|c| c.is_ascii_digit()) => {
            match lower[1..].parse::<u8>() {
                Ok(n) if (1..=12).contains(&n) => matches!(event.code, KeyCode::F(k) if k == n),
                _ => false,
            }
        }
        // Single character - case-sensitive (g != G)
        _ => {
            let mut chars = trimmed.chars();
            if let (Some(first), None) = (chars.next(), chars.next()) {
                matches!(event.code, KeyCode::Char(c) if c == first)
            } else {
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::contact::Contact;
    use std::path::PathBuf;

    fn key(code: KeyCode) -> KeyEvent {
        KeyEvent::new(code, KeyModifiers::NONE)
    }

    fn type_text(app: &mut App, text: &str) {
        for c in text.chars() {
            app.handle_key(key(KeyCode::Char(c))).unwrap();
        }
    }

    fn config() -> Config {
        Config::defaults(PathBuf::from("test.toml")).unwrap()
    }

    fn seeded_db() -> Database {
        let mut db = Database::open_in_memory().unwrap();
        db.save(&Contact::new("Ann", "Lee", "x")).unwrap();
        db.save(&Contact::new("Bo", "Kim", "y")).unwrap();
        db
    }

    #[test]
    fn test_key_matching() {
        assert!(key_matches_single(&key(KeyCode::F(2)), "F2"));
        assert!(!key_matches_single(&key(KeyCode::F(2)), "F1"));
        assert!(key_matches_single(&key(KeyCode::Char('G')), "G"));
        assert!(!key_matches_single(&key(KeyCode::Char('g')), "G"));
        assert!(key_matches_single(&key(KeyCode::Esc), "Escape"));
        assert!(!key_matches_single(
            &KeyEvent::new(KeyCode::Char('q'), KeyModifiers::CONTROL),
            "q"
        ));
    }

    #[test]
    fn test_search_typing_filters_table() {
        let mut db = seeded_db();
        let config = config();
        let mut app = App::new(&mut db, &config).unwrap();

        app.handle_key(key(KeyCode::Char('/'))).unwrap();
        assert_eq!(app.focus, Pane::Search);
        type_text(&mut app, "an");
        assert_eq!(app.table.filter(), "an");
        assert_eq!(app.table.visible().len(), 1);
        assert_eq!(app.table.visible()[0].first_name, "Ann");

        // 'q' is text while searching
        type_text(&mut app, "q");
        assert!(app.table.visible().is_empty());

        app.handle_key(key(KeyCode::Esc)).unwrap();
        assert_eq!(app.focus, Pane::Table);
        assert!(app.handle_key(key(KeyCode::Char('q'))).unwrap());
    }

    #[test]
    fn test_add_flow_persists_and_shows_contact() {
        let mut db = seeded_db();
        let config = config();
        {
            let mut app = App::new(&mut db, &config).unwrap();
            app.handle_key(key(KeyCode::Char('a'))).unwrap();
            assert!(app.form.as_ref().map(EditForm::is_new).unwrap_or(false));

            type_text(&mut app, "Cy");
            app.handle_key(key(KeyCode::Tab)).unwrap();
            type_text(&mut app, "Park");
            // Enter walks to the Save button, then submits
            app.handle_key(key(KeyCode::Enter)).unwrap();
            app.handle_key(key(KeyCode::Enter)).unwrap();
            assert!(app.form.is_some());
            app.handle_key(key(KeyCode::Enter)).unwrap();

            assert!(app.form.is_none());
            assert_eq!(app.table.contacts().len(), 3);
            let added = app.table.selected_contact().cloned().unwrap();
            assert_eq!(added.first_name, "Cy");
            assert!(added.is_persisted());
        }
        let (_, stored) = db.list().unwrap();
        assert_eq!(stored.len(), 3);
        assert_eq!(stored[2].last_name, "Park");
    }

    #[test]
    fn test_edit_flow_updates_in_place() {
        let mut db = seeded_db();
        let config = config();
        {
            let mut app = App::new(&mut db, &config).unwrap();
            app.handle_key(key(KeyCode::Char('j'))).unwrap();
            app.handle_key(key(KeyCode::Char('e'))).unwrap();
            let form = app.form.as_ref().unwrap();
            assert!(!form.is_new());

            type_text(&mut app, "b");
            app.handle_key(key(KeyCode::BackTab)).unwrap();
            app.handle_key(key(KeyCode::Enter)).unwrap();

            assert!(app.form.is_none());
            assert_eq!(app.table.contacts().len(), 2);
            assert_eq!(app.table.contacts()[1].first_name, "Bob");
            assert_eq!(app.table.contacts()[1].id, 2);
        }
        let (_, stored) = db.list().unwrap();
        assert_eq!(stored[1], Contact::new("Bob", "Kim", "y").with_id(2));
    }

    #[test]
    fn test_cancel_discards_form() {
        let mut db = seeded_db();
        let config = config();
        let mut app = App::new(&mut db, &config).unwrap();
        app.handle_key(key(KeyCode::F(2))).unwrap();
        type_text(&mut app, "Zed");
        app.handle_key(key(KeyCode::Esc)).unwrap();
        assert!(app.form.is_none());
        assert_eq!(app.table.contacts().len(), 2);
    }

    #[test]
    fn test_added_contact_hidden_by_active_filter() {
        let mut db = seeded_db();
        let config = config();
        let mut app = App::new(&mut db, &config).unwrap();
        app.handle_key(key(KeyCode::Char('/'))).unwrap();
        type_text(&mut app, "kim");
        app.handle_key(key(KeyCode::Esc)).unwrap();

        app.handle_key(key(KeyCode::Char('a'))).unwrap();
        type_text(&mut app, "Dee");
        app.handle_key(key(KeyCode::BackTab)).unwrap();
        app.handle_key(key(KeyCode::Enter)).unwrap();

        assert_eq!(app.table.contacts().len(), 3);
        assert_eq!(app.table.visible().len(), 1);
        assert_eq!(app.table.visible()[0].last_name, "Kim");
    }

    #[test]
    fn test_escape_in_table_clears_search() {
        let mut db = seeded_db();
        let config = config();
        let mut app = App::new(&mut db, &config).unwrap();
        app.handle_key(key(KeyCode::Char('/'))).unwrap();
        type_text(&mut app, "kim");
        app.handle_key(key(KeyCode::Enter)).unwrap();
        assert_eq!(app.table.visible().len(), 1);

        app.handle_key(key(KeyCode::Esc)).unwrap();
        assert_eq!(app.search.value(), "");
        assert_eq!(app.table.filter(), "");
        assert_eq!(app.table.visible().len(), 2);
    }

    #[test]
    fn test_help_modal_opens_and_closes() {
        let mut db = seeded_db();
        let config = config();
        let mut app = App::new(&mut db, &config).unwrap();
        app.handle_key(key(KeyCode::Char('?'))).unwrap();
        assert!(app.help_modal.is_some());
        // quit key only closes the modal
        assert!(!app.handle_key(key(KeyCode::Char('q'))).unwrap());
        assert!(app.help_modal.is_none());
    }
}
