/// Derive the URL-safe identifier for a title: lowercase, runs of
/// non-alphanumeric characters collapsed to single hyphens, edges trimmed.
///
/// The slug is recomputed from the current title on every save, so renaming
/// a resource changes its public URL.
pub fn slugify(title: &str) -> String {
    title
        .to_lowercase()
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() { c } else { '-' })
        .collect::<String>()
        .split('-')
        .filter(|s| !s.is_empty())
        .collect::<Vec<_>>()
        .join("-")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lowercases_and_hyphenates() {
        assert_eq!(slugify("Rust Learning Hub"), "rust-learning-hub");
    }

    #[test]
    fn collapses_punctuation_runs() {
        assert_eq!(slugify("Tools & Tips @ Home"), "tools-tips-home");
    }

    #[test]
    fn trims_edges() {
        assert_eq!(slugify("  Spaced Out  "), "spaced-out");
    }

    #[test]
    fn apostrophes_become_hyphens() {
        assert_eq!(slugify("John's Picks"), "john-s-picks");
    }

    #[test]
    fn deterministic_for_equal_titles() {
        assert_eq!(slugify("Some Title"), slugify("Some Title"));
    }

    #[test]
    fn symbol_only_title_yields_empty() {
        assert_eq!(slugify("!!!"), "");
    }
}
