//! Dutch postal code validation.

use lazy_regex::regex_captures;

/// Validates a postal code and returns it in canonical `DDDD XX` form.
///
/// Input is trimmed and ASCII-uppercased first; one optional space is allowed
/// between the digits and the letters. Anything else, including the empty
/// string, is rejected.
pub fn normalize(input: &str) -> Option<String> {
    let candidate = input.trim().to_ascii_uppercase();
    let (_, digits, letters) = regex_captures!(r"^([0-9]{4}) ?([A-Z]{2})$", &candidate)?;
    Some(format!("{digits} {letters}"))
}

/// Returns true when `input` is an acceptable postal code.
pub fn is_valid(input: &str) -> bool {
    normalize(input).is_some()
}
