/// A full display name split into the `(first_name, surname)` pair used by the
/// target `people` table.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SplitName {
    pub first_name: String,
    /// Empty (not absent) for single-token names so it still compares equal.
    pub surname: String,
}

/// Split a full name on whitespace: the last token is the surname, everything
/// before it (re-joined with single spaces) is the first name.
///
/// Returns `None` when the name has no tokens at all.
pub fn split_full_name(full_name: &str) -> Option<SplitName> {
    let mut tokens: Vec<&str> = full_name.split_whitespace().collect();
    let last = tokens.pop()?;
    if tokens.is_empty() {
        return Some(SplitName {
            first_name: last.to_string(),
            surname: String::new(),
        });
    }
    Some(SplitName {
        first_name: tokens.join(" "),
        surname: last.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn two_tokens() {
        let n = split_full_name("Bob Odenkirk").unwrap();
        assert_eq!(n.first_name, "Bob");
        assert_eq!(n.surname, "Odenkirk");
    }

    #[test]
    fn middle_names_stay_with_first_name() {
        let n = split_full_name("  Mary  Elizabeth Winstead ").unwrap();
        assert_eq!(n.first_name, "Mary Elizabeth");
        assert_eq!(n.surname, "Winstead");
    }

    #[test]
    fn single_token_has_empty_surname() {
        let n = split_full_name("Zendaya").unwrap();
        assert_eq!(n.first_name, "Zendaya");
        assert_eq!(n.surname, "");
    }

    #[test]
    fn blank_names_do_not_split() {
        assert!(split_full_name("").is_none());
        assert!(split_full_name(" \t ").is_none());
    }
}
