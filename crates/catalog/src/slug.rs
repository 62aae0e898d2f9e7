/// URL slug from free text.
///
/// Lowercases, drops anything that is not alphanumeric, whitespace, `-` or `_`,
/// then collapses whitespace and dash runs into a single `-`.
pub fn generate_slug(text: &str) -> String {
    let mut slug = String::with_capacity(text.len());
    let mut pending_dash = false;

    for ch in text.trim().to_lowercase().chars() {
        if ch.is_whitespace() || ch == '-' {
            pending_dash = true;
        } else if ch.is_alphanumeric() || ch == '_' {
            if pending_dash && !slug.is_empty() {
                slug.push('-');
            }
            pending_dash = false;
            slug.push(ch);
        }
    }

    slug
}

/// Strip the separators people type into ISBNs.
pub fn normalize_isbn(isbn: &str) -> String {
    isbn.chars().filter(|c| *c != '-' && !c.is_whitespace()).collect()
}
