//! Authorization header parsing.

/// Authentication scheme accepted by [`parse_bearer`], compared
/// case-insensitively.
pub const BEARER_SCHEME: &str = "bearer";

/// Extract the token from an `Authorization` header value of the form
/// `"<scheme> <token>"`.
///
/// The value is split on single spaces and the second segment is the token.
/// Returns `None` unless the scheme is `Bearer` (any case) and that segment
/// is non-empty, so a doubled space yields no token. Segments after the
/// token are ignored.
#[must_use]
pub fn parse_bearer(header: &str) -> Option<&str> {
    let mut segments = header.split(' ');
    let scheme = segments.next()?;
    let token = segments.next()?;

    if !scheme.eq_ignore_ascii_case(BEARER_SCHEME) || token.is_empty() {
        return None;
    }

    Some(token)
}
