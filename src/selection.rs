use crate::types::AttributeSet;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("'{name}' is not one of the configured attributes")]
pub struct InvalidSelection {
    pub name: String,
}

/// The attribute currently expressed by both views.
///
/// Owned by the coordinator, which is its only writer; views read it through
/// shared borrows.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SelectionState {
    attributes: AttributeSet,
    expressed: usize,
}

impl SelectionState {
    /// Starts on the first attribute of the set.
    pub fn new(attributes: AttributeSet) -> Self {
        Self {
            attributes,
            expressed: 0,
        }
    }

    pub fn attributes(&self) -> &AttributeSet {
        &self.attributes
    }

    pub fn expressed(&self) -> &str {
        self.attributes
            .get(self.expressed)
            .unwrap_or_else(|| self.attributes.first())
    }

    pub fn select(&mut self, name: &str) -> Result<(), InvalidSelection> {
        let idx = self
            .attributes
            .position(name)
            .ok_or_else(|| InvalidSelection {
                name: name.to_string(),
            })?;
        self.expressed = idx;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn starts_on_first_attribute_and_rejects_unknown() {
        let mut state = SelectionState::new(AttributeSet::new(["a", "b"]).unwrap());
        assert_eq!(state.expressed(), "a");

        state.select("b").unwrap();
        assert_eq!(state.expressed(), "b");

        let err = state.select("zzz").unwrap_err();
        assert_eq!(err.name, "zzz");
        assert_eq!(state.expressed(), "b");
    }
}
