//! This module defines [Dictionary].

use hashbrown::HashMap;

use crate::datatypes::Term;

/// Bidirectional mapping between the textual form of constants and their [Term] encoding.
///
/// The dictionary is only consulted when data enters or leaves the engine.
/// Joins and the chase itself operate on encoded terms.
#[derive(Debug, Default, Clone)]
pub struct Dictionary {
    /// Strings indexed by their id
    strings: Vec<String>,
    /// Id of each string
    ids: HashMap<String, u64>,
}

impl Dictionary {
    /// Create a new empty [Dictionary].
    pub fn new() -> Self {
        Self::default()
    }

    /// Encode a string, adding it to the dictionary if it is not already present.
    pub fn add(&mut self, value: &str) -> Term {
        if let Some(&id) = self.ids.get(value) {
            return Term::constant(id);
        }

        let id = self.strings.len() as u64;
        self.strings.push(value.to_owned());
        self.ids.insert(value.to_owned(), id);

        Term::constant(id)
    }

    /// Return the encoding of a string if it is known.
    pub fn get(&self, value: &str) -> Option<Term> {
        self.ids.get(value).map(|&id| Term::constant(id))
    }

    /// Return the string that was encoded as the given constant.
    ///
    /// Returns `None` for nulls and for unknown ids.
    pub fn resolve(&self, term: Term) -> Option<&str> {
        if term.is_null() {
            return None;
        }

        usize::try_from(term.value())
            .ok()
            .and_then(|index| self.strings.get(index))
            .map(String::as_str)
    }

    /// Render a term for display.
    pub fn display(&self, term: Term) -> String {
        match self.resolve(term) {
            Some(value) => value.to_owned(),
            None => format!("{term}"),
        }
    }

    /// Return the number of distinct strings in the dictionary.
    pub fn len(&self) -> usize {
        self.strings.len()
    }

    /// Return `true` if the dictionary contains no strings.
    pub fn is_empty(&self) -> bool {
        self.strings.is_empty()
    }
}

#[cfg(test)]
mod test {
    use test_log::test;

    use crate::datatypes::Term;

    use super::Dictionary;

    #[test]
    fn add_is_idempotent() {
        let mut dictionary = Dictionary::new();

        let a = dictionary.add("a");
        let b = dictionary.add("b");

        assert_eq!(dictionary.add("a"), a);
        assert_ne!(a, b);
        assert_eq!(dictionary.len(), 2);
        assert_eq!(dictionary.get("b"), Some(b));
        assert_eq!(dictionary.get("c"), None);
    }

    #[test]
    fn resolve_and_display() {
        let mut dictionary = Dictionary::new();
        let a = dictionary.add("alice");

        assert_eq!(dictionary.resolve(a), Some("alice"));
        assert_eq!(dictionary.resolve(Term::null(a.value())), None);
        assert_eq!(dictionary.display(Term::null(3)), "_:N3");
        assert_eq!(dictionary.display(a), "alice");
    }
}
