use std::collections::HashMap;

/// Deduplicating string table. The indices it hands out become heap
/// handles verbatim when the unit's strings are adopted by the machine,
/// so the table must be moved out whole and in order.
#[derive(Debug, Default)]
pub struct Interner {
    map: HashMap<String, u32>,
    strings: Vec<String>,
}

impl Interner {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn intern(&mut self, s: &str) -> u32 {
        if let Some(&index) = self.map.get(s) {
            return index;
        }
        let index = self.strings.len() as u32;
        self.strings.push(s.to_string());
        self.map.insert(s.to_string(), index);
        index
    }

    pub fn into_strings(self) -> Vec<String> {
        self.strings
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn interning_deduplicates_and_preserves_order() {
        let mut interner = Interner::new();
        let a = interner.intern("alpha");
        let b = interner.intern("beta");
        assert_eq!(interner.intern("alpha"), a);
        assert_ne!(a, b);
        assert_eq!(interner.into_strings(), vec!["alpha", "beta"]);
    }
}
