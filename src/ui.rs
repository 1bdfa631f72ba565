//! Widget models for the attribute dropdown and the collapsible info panel.
//! Host toolkits render these and forward user input back.

use crate::types::AttributeSet;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DropdownOption {
    pub value: String,
    pub label: String,
    pub disabled: bool,
}

/// Single-select control listing every attribute after a disabled title row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttributeDropdown {
    options: Vec<DropdownOption>,
    selected: Option<usize>,
}

impl AttributeDropdown {
    pub fn new(attributes: &AttributeSet) -> Self {
        let mut options = vec![DropdownOption {
            value: String::new(),
            label: "Select Attribute".to_string(),
            disabled: true,
        }];
        options.extend(attributes.iter().map(|name| DropdownOption {
            value: name.to_string(),
            label: name.to_string(),
            disabled: false,
        }));
        Self {
            options,
            selected: None,
        }
    }

    pub fn options(&self) -> &[DropdownOption] {
        &self.options
    }

    pub fn selected(&self) -> Option<&str> {
        self.selected.map(|i| self.options[i].value.as_str())
    }

    /// Applies a change event. Returns the attribute to express, or `None`
    /// when `value` is not a selectable option.
    pub fn change(&mut self, value: &str) -> Option<&str> {
        let idx = self
            .options
            .iter()
            .position(|o| !o.disabled && o.value == value)?;
        self.selected = Some(idx);
        Some(self.options[idx].value.as_str())
    }
}

/// Collapsible panel; open panels grow to their content height.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Accordion {
    content_height: f64,
    open: bool,
}

impl Accordion {
    pub fn new(content_height: f64) -> Self {
        Self {
            content_height,
            open: false,
        }
    }

    pub fn toggle(&mut self) {
        self.open = !self.open;
    }

    pub fn is_open(&self) -> bool {
        self.open
    }

    pub fn max_height(&self) -> Option<f64> {
        self.open.then_some(self.content_height)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dropdown_lists_title_then_attributes() {
        let attrs = AttributeSet::new(["var1", "var2"]).unwrap();
        let mut dropdown = AttributeDropdown::new(&attrs);

        let labels: Vec<&str> = dropdown.options().iter().map(|o| o.label.as_str()).collect();
        assert_eq!(labels, vec!["Select Attribute", "var1", "var2"]);
        assert!(dropdown.options()[0].disabled);

        assert_eq!(dropdown.change("var2"), Some("var2"));
        assert_eq!(dropdown.selected(), Some("var2"));
        assert_eq!(dropdown.change(""), None);
        assert_eq!(dropdown.change("nope"), None);
        assert_eq!(dropdown.selected(), Some("var2"));
    }

    #[test]
    fn accordion_toggles_max_height() {
        let mut panel = Accordion::new(120.0);
        assert_eq!(panel.max_height(), None);
        panel.toggle();
        assert_eq!(panel.max_height(), Some(120.0));
        panel.toggle();
        assert!(!panel.is_open());
    }
}
