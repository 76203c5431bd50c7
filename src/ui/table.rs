use tracing::debug;

use crate::contact::{Contact, Header};
use crate::search;

/// In-memory mirror of the `people` table plus the active search.
///
/// `visible` is always `filter_contacts(contacts, filter)`; every mutation
/// re-derives it, and the draw pass rebuilds the table widget from it.
#[derive(Debug, Clone)]
pub struct ContactTable {
    headers: Vec<Header>,
    contacts: Vec<Contact>,
    filter: String,
    visible: Vec<Contact>,
    selected: usize,
}

impl ContactTable {
    pub fn new(headers: Vec<Header>, contacts: Vec<Contact>) -> Self {
        let visible = contacts.clone();
        Self {
            headers,
            contacts,
            filter: String::new(),
            visible,
            selected: 0,
        }
    }

    pub fn headers(&self) -> &[Header] {
        &self.headers
    }

    pub fn contacts(&self) -> &[Contact] {
        &self.contacts
    }

    pub fn visible(&self) -> &[Contact] {
        &self.visible
    }

    pub fn filter(&self) -> &str {
        &self.filter
    }

    pub fn add(&mut self, contact: Contact) {
        self.contacts.push(contact);
        self.refilter();
    }

    /// Replace the entry with the same id. Unknown ids are ignored.
    pub fn update(&mut self, contact: Contact) {
        match self.contacts.iter_mut().find(|c| c.id == contact.id) {
            Some(slot) => *slot = contact,
            None => debug!(id = contact.id, "update for unknown contact ignored"),
        }
        self.refilter();
    }

    pub fn set_filter(&mut self, search: &str) {
        self.filter = search.to_string();
        self.refilter();
    }

    fn refilter(&mut self) {
        let previous = self.selected_contact().map(|c| c.id);

        self.visible = search::filter_contacts(&self.contacts, &self.filter);
        debug!(
            filter = %self.filter,
            shown = self.visible.len(),
            total = self.contacts.len(),
            "filtered contacts"
        );

        if let Some(id) = previous {
            if let Some(index) = self.visible.iter().position(|c| c.id == id) {
                self.selected = index;
            }
        }
        self.clamp_selection();
    }

    pub fn selected(&self) -> Option<usize> {
        if self.visible.is_empty() {
            None
        } else {
            Some(self.selected)
        }
    }

    pub fn selected_contact(&self) -> Option<&Contact> {
        self.visible.get(self.selected)
    }

    pub fn select_next(&mut self) {
        self.move_selection(1);
    }

    pub fn select_prev(&mut self) {
        self.move_selection(-1);
    }

    pub fn select_first(&mut self) {
        self.selected = 0;
    }

    pub fn select_last(&mut self) {
        self.selected = self.visible.len().saturating_sub(1);
    }

    pub fn page(&mut self, delta: isize) {
        self.move_selection(delta);
    }

    /// Select the visible row holding `id`, if any.
    pub fn select_id(&mut self, id: i64) {
        if let Some(index) = self.visible.iter().position(|c| c.id == id) {
            self.selected = index;
        }
    }

    fn move_selection(&mut self, delta: isize) {
        if self.visible.is_empty() {
            return;
        }
        let len = self.visible.len() as isize;
        let index = (self.selected as isize + delta).clamp(0, len - 1);
        self.selected = index as usize;
    }

    fn clamp_selection(&mut self) {
        if self.visible.is_empty() {
            self.selected = 0;
        } else if self.selected >= self.visible.len() {
            self.selected = self.visible.len() - 1;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::contact::default_headers;

    fn three() -> ContactTable {
        ContactTable::new(
            default_headers(),
            vec![
                Contact::new("Ann", "Lee", "x").with_id(1),
                Contact::new("Bo", "Kim", "y").with_id(2),
                Contact::new("Cy", "Park", "z").with_id(3),
            ],
        )
    }

    fn ids(contacts: &[Contact]) -> Vec<i64> {
        contacts.iter().map(|c| c.id).collect()
    }

    #[test]
    fn test_new_shows_everything() {
        let table = three();
        assert_eq!(table.filter(), "");
        assert_eq!(table.visible(), table.contacts());
        assert_eq!(table.selected(), Some(0));
    }

    #[test]
    fn test_update_replaces_only_matching_id() {
        let mut table = three();
        let before = table.contacts().to_vec();

        table.update(Contact::new("Bob", "Kimura", "moved").with_id(2));

        assert_eq!(table.contacts()[0], before[0]);
        assert_eq!(table.contacts()[1], Contact::new("Bob", "Kimura", "moved").with_id(2));
        assert_eq!(table.contacts()[2], before[2]);
        assert_eq!(table.visible(), table.contacts());
    }

    #[test]
    fn test_update_unknown_id_is_noop() {
        let mut table = three();
        let before = table.contacts().to_vec();

        table.update(Contact::new("Nobody", "", "").with_id(99));

        assert_eq!(table.contacts(), before.as_slice());
        assert_eq!(table.visible(), before.as_slice());
    }

    #[test]
    fn test_add_appends_without_reordering() {
        let mut table = three();
        let before = table.contacts().to_vec();

        table.add(Contact::new("Di", "Moss", "").with_id(4));

        assert_eq!(&table.contacts()[..3], before.as_slice());
        assert_eq!(ids(table.contacts()), vec![1, 2, 3, 4]);
    }

    #[test]
    fn test_add_visible_only_if_matching() {
        let mut table = three();
        table.set_filter("ar");
        assert_eq!(ids(table.visible()), vec![3]);

        table.add(Contact::new("Di", "Moss", "").with_id(4));
        assert_eq!(ids(table.visible()), vec![3]);

        table.add(Contact::new("Mark", "", "").with_id(5));
        assert_eq!(ids(table.visible()), vec![3, 5]);
    }

    #[test]
    fn test_update_can_move_contact_out_of_view() {
        let mut table = three();
        table.set_filter("bo");
        assert_eq!(ids(table.visible()), vec![2]);

        table.update(Contact::new("Bob", "Kim", "y").with_id(2));
        assert_eq!(ids(table.visible()), vec![2]);

        table.update(Contact::new("Ray", "Kim", "y").with_id(2));
        assert!(table.visible().is_empty());
        assert_eq!(table.selected(), None);
        assert!(table.selected_contact().is_none());
    }

    #[test]
    fn test_set_filter_rederives_and_clearing_restores() {
        let mut table = three();
        table.set_filter("K");
        assert_eq!(ids(table.visible()), vec![2, 3]);

        table.set_filter("");
        assert_eq!(table.visible(), table.contacts());
    }

    #[test]
    fn test_selection_follows_contact_across_filters() {
        let mut table = three();
        table.select_last();
        assert_eq!(table.selected_contact().map(|c| c.id), Some(3));

        table.set_filter("park");
        assert_eq!(table.selected(), Some(0));
        assert_eq!(table.selected_contact().map(|c| c.id), Some(3));

        table.set_filter("");
        assert_eq!(table.selected_contact().map(|c| c.id), Some(3));
    }

    #[test]
    fn test_selection_is_clamped() {
        let mut table = three();
        table.select_prev();
        assert_eq!(table.selected(), Some(0));
        table.page(10);
        assert_eq!(table.selected(), Some(2));
        table.page(-10);
        assert_eq!(table.selected(), Some(0));
        table.select_next();
        assert_eq!(table.selected(), Some(1));
    }

    #[test]
    fn test_select_id() {
        let mut table = three();
        table.select_id(3);
        assert_eq!(table.selected(), Some(2));
        table.select_id(42);
        assert_eq!(table.selected(), Some(2));
    }
}
