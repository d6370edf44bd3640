use crate::normalization::name::{split_full_name, SplitName};

/// Identity of a movie in the target dataset: exact title plus release year.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct MovieKey {
    pub title: String,
    pub year: i32,
}

impl MovieKey {
    pub fn new(title: impl Into<String>, year: i32) -> Self {
        Self {
            title: title.into(),
            year,
        }
    }
}

/// Identity of a person in the target dataset: `(first_name, surname)` exactly
/// as they would be written to the `people` table.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PersonKey {
    pub first_name: String,
    pub surname: String,
}

impl PersonKey {
    pub fn new(first_name: impl Into<String>, surname: impl Into<String>) -> Self {
        Self {
            first_name: first_name.into(),
            surname: surname.into(),
        }
    }

    /// `None` when the name has no usable first segment.
    pub fn from_full_name(full_name: &str) -> Option<Self> {
        split_full_name(full_name).map(Self::from)
    }
}

impl From<SplitName> for PersonKey {
    fn from(n: SplitName) -> Self {
        Self {
            first_name: n.first_name,
            surname: n.surname,
        }
    }
}
