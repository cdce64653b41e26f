use serde::{Deserialize, Serialize};
use std::fmt;

/// A material kind carried by streams. Equality is by name.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Commodity {
    name: String,
}

impl Commodity {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }
}

impl fmt::Display for Commodity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn equality_by_name() {
        assert_eq!(Commodity::new("steel"), Commodity::new("steel"));
        assert_ne!(Commodity::new("steel"), Commodity::new("slag"));
    }

    #[test]
    fn display_is_name() {
        assert_eq!(Commodity::new("h2").to_string(), "h2");
    }
}
