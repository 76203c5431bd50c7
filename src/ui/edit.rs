use crossterm::event::{Event, KeyEvent};
use tui_input::backend::crossterm::EventHandler;
use tui_input::Input;

use crate::contact::Contact;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FormField {
    FirstName,
    LastName,
    Comment,
    Save,
}

impl FormField {
    pub const INPUTS: [FormField; 3] = [FormField::FirstName, FormField::LastName, FormField::Comment];

    pub fn placeholder(self) -> &'static str {
        match self {
            FormField::FirstName => "First name",
            FormField::LastName => "Last name",
            FormField::Comment => "Comment",
            FormField::Save => "Save",
        }
    }

    pub fn next(self) -> Self {
        match self {
            FormField::FirstName => FormField::LastName,
            FormField::LastName => FormField::Comment,
            FormField::Comment => FormField::Save,
            FormField::Save => FormField::FirstName,
        }
    }

    pub fn prev(self) -> Self {
        match self {
            FormField::FirstName => FormField::Save,
            FormField::LastName => FormField::FirstName,
            FormField::Comment => FormField::LastName,
            FormField::Save => FormField::Comment,
        }
    }
}

/// Add/edit form for one contact. No validation: whatever is typed is saved.
#[derive(Debug, Clone)]
pub struct EditForm {
    id: i64,
    first_name: Input,
    last_name: Input,
    comment: Input,
    focus: FormField,
}

impl EditForm {
    /// Blank form for a new contact.
    pub fn blank() -> Self {
        Self::from_contact(&Contact::default())
    }

    /// Form pre-filled with an existing contact; saving updates that row.
    pub fn from_contact(contact: &Contact) -> Self {
        Self {
            id: contact.id,
            first_name: Input::new(contact.first_name.clone()),
            last_name: Input::new(contact.last_name.clone()),
            comment: Input::new(contact.comment.clone()),
            focus: FormField::FirstName,
        }
    }

    /// Whether the form was opened for a contact storage has not seen yet.
    pub fn is_new(&self) -> bool {
        self.id <= 0
    }

    pub fn title(&self) -> &'static str {
        if self.is_new() {
            "ADD CONTACT"
        } else {
            "EDIT CONTACT"
        }
    }

    pub fn focus(&self) -> FormField {
        self.focus
    }

    pub fn focus_next(&mut self) {
        self.focus = self.focus.next();
    }

    pub fn focus_prev(&mut self) {
        self.focus = self.focus.prev();
    }

    pub fn input(&self, field: FormField) -> Option<&Input> {
        match field {
            FormField::FirstName => Some(&self.first_name),
            FormField::LastName => Some(&self.last_name),
            FormField::Comment => Some(&self.comment),
            FormField::Save => None,
        }
    }

    fn focused_input_mut(&mut self) -> Option<&mut Input> {
        match self.focus {
            FormField::FirstName => Some(&mut self.first_name),
            FormField::LastName => Some(&mut self.last_name),
            FormField::Comment => Some(&mut self.comment),
            FormField::Save => None,
        }
    }

    pub fn handle_key_event(&mut self, key: KeyEvent) -> bool {
        match self.focused_input_mut() {
            Some(input) => input.handle_event(&Event::Key(key)).is_some(),
            None => false,
        }
    }

    /// The contact as it should be handed to storage.
    pub fn to_contact(&self) -> Contact {
        Contact {
            id: self.id.max(0),
            first_name: self.first_name.value().to_string(),
            last_name: self.last_name.value().to_string(),
            comment: self.comment.value().to_string(),
        }
    }
}
