use indexmap::IndexMap;

/// Maps an upstream ISO country code onto the target schema's `country` value.
#[derive(Debug, Clone)]
pub struct CountryResolver {
    default_code: String,
    overrides: IndexMap<String, String>,
}

impl CountryResolver {
    pub fn new(default_code: impl Into<String>, overrides: IndexMap<String, String>) -> Self {
        Self {
            default_code: default_code.into(),
            overrides,
        }
    }

    /// Empty or absent codes fall back to the default, overrides win next,
    /// anything else is lower-cased.
    pub fn resolve(&self, code: Option<&str>) -> String {
        let Some(code) = code.filter(|c| !c.is_empty()) else {
            return self.default_code.clone();
        };
        match self.overrides.get(code) {
            Some(mapped) => mapped.clone(),
            None => code.to_lowercase(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn resolver() -> CountryResolver {
        let overrides = [("GB", "gb"), ("ES", "sp")]
            .into_iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        CountryResolver::new("us", overrides)
    }

    #[test]
    fn override_wins() {
        let r = resolver();
        assert_eq!(r.resolve(Some("GB")), "gb");
        assert_eq!(r.resolve(Some("ES")), "sp");
    }

    #[test]
    fn empty_or_missing_uses_default() {
        let r = resolver();
        assert_eq!(r.resolve(Some("")), "us");
        assert_eq!(r.resolve(None), "us");
    }

    #[test]
    fn unknown_codes_are_lowercased() {
        assert_eq!(resolver().resolve(Some("NG")), "ng");
    }
}
