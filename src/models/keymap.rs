use std::collections::BTreeSet;

/// Reserved for "done with this token"
const SKIP_KEY: char = 'q';

/// Bijective name -> single key character mapping for the identification session.
///
/// Each name gets the first unused alphabetic letter occurring in it (left to
/// right, lowercased); if the name offers none, the first unused letter a..z.
/// `'q'` is never assignable.
#[derive(Debug, Clone)]
pub struct KeyMap {
    bindings: Vec<(char, String)>,
}

impl KeyMap {
    pub fn derive(names: &[String]) -> Self {
        let mut used: BTreeSet<char> = BTreeSet::new();
        let mut bindings = Vec::new();

        for name in names {
            let key = name
                .chars()
                .filter(|c| c.is_ascii_alphabetic())
                .map(|c| c.to_ascii_lowercase())
                .find(|c| *c != SKIP_KEY && !used.contains(c))
                .or_else(|| ('a'..='z').find(|c| *c != SKIP_KEY && !used.contains(c)));

            if let Some(key) = key {
                used.insert(key);
                bindings.push((key, name.clone()));
            }
        }

        Self { bindings }
    }

    pub fn name_for(&self, key: char) -> Option<&str> {
        self.bindings
            .iter()
            .find(|(k, _)| *k == key)
            .map(|(_, name)| name.as_str())
    }

    /// Bindings in name order, for legend rendering
    pub fn iter(&self) -> impl Iterator<Item = (char, &str)> {
        self.bindings.iter().map(|(k, name)| (*k, name.as_str()))
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.bindings.iter().map(|(_, name)| name.as_str())
    }

    pub fn is_empty(&self) -> bool {
        self.bindings.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn names(input: &[&str]) -> Vec<String> {
        input.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_uses_first_letter() {
        let map = KeyMap::derive(&names(&["Peter", "Eby", "O'Neill"]));
        assert_eq!(map.name_for('p'), Some("Peter"));
        assert_eq!(map.name_for('e'), Some("Eby"));
        assert_eq!(map.name_for('o'), Some("O'Neill"));
    }

    #[test]
    fn test_handles_collision() {
        let map = KeyMap::derive(&names(&["Peter", "Pat"]));
        assert_eq!(map.name_for('p'), Some("Peter"));
        assert_eq!(map.name_for('a'), Some("Pat"));
    }

    #[test]
    fn test_never_assigns_q() {
        let map = KeyMap::derive(&names(&["Quincy"]));
        assert_eq!(map.name_for('q'), None);
        assert_eq!(map.name_for('u'), Some("Quincy"));
    }

    #[test]
    fn test_falls_back_alphabetically() {
        // no usable letter in the name itself
        let map = KeyMap::derive(&names(&["---", "123"]));
        assert_eq!(map.name_for('a'), Some("---"));
        assert_eq!(map.name_for('b'), Some("123"));
    }

    #[test]
    fn test_iter_keeps_name_order() {
        let map = KeyMap::derive(&names(&["Peter", "Eby"]));
        let legend: Vec<(char, &str)> = map.iter().collect();
        assert_eq!(legend, vec![('p', "Peter"), ('e', "Eby")]);
    }
}
