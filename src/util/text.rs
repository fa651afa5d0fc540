use std::borrow::Cow;

/// Converts arbitrary text into a URL-safe slug.
///
/// Lower-cases the input, collapses every run of non-alphanumeric characters
/// into a single hyphen and strips leading/trailing hyphens. Only ASCII
/// letters and digits survive; anything else acts as a separator.
///
/// # Examples
///
/// ```
/// use tunefeed::util::slugify;
///
/// assert_eq!(slugify("Hello, World!"), "hello-world");
/// assert_eq!(slugify("example.com/feed.xml"), "example-com-feed-xml");
/// assert_eq!(slugify("--- ---"), "");
/// ```
pub fn slugify(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut pending_hyphen = false;

    for c in s.chars() {
        if c.is_ascii_alphanumeric() {
            if pending_hyphen && !out.is_empty() {
                out.push('-');
            }
            pending_hyphen = false;
            out.push(c.to_ascii_lowercase());
        } else {
            pending_hyphen = true;
        }
    }

    out
}

/// Strips ASCII control characters from feed-supplied text and trims it.
///
/// Tab, newline and carriage return are preserved inside the text. Returns
/// `Cow::Borrowed` when nothing needs to change.
pub fn clean_text(s: &str) -> Cow<'_, str> {
    let trimmed = s.trim();
    let needs_strip = trimmed
        .bytes()
        .any(|b| b == 0x7f || (b < 0x20 && b != b'\t' && b != b'\n' && b != b'\r'));

    if !needs_strip {
        return Cow::Borrowed(trimmed);
    }

    Cow::Owned(
        trimmed
            .chars()
            .filter(|&c| !c.is_control() || matches!(c, '\t' | '\n' | '\r'))
            .collect(),
    )
}
