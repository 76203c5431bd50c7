use crate::contact::Contact;

/// Normalize a string for matching. Plain lowercasing, no locale collation.
pub fn normalize(s: &str) -> String {
    s.to_lowercase()
}

/// Whether any field of the contact's string form contains `needle`.
/// `needle` must already be normalized.
pub fn matches(contact: &Contact, needle: &str) -> bool {
    contact
        .to_strings()
        .iter()
        .any(|field| normalize(field).contains(needle))
}

/// Keep the contacts matching `search` in any field, in their original order.
/// An empty search matches everything.
pub fn filter_contacts(contacts: &[Contact], search: &str) -> Vec<Contact> {
    let needle = normalize(search);
    contacts
        .iter()
        .filter(|contact| matches(contact, &needle))
        .cloned()
        .collect()
}
