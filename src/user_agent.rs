//! User-Agent sent with every Gallica request.
//!
//! Gallica asks heavy clients to identify themselves; the crate name and
//! version are always present so server operators can tell runs apart.

/// Free-text purpose tag appended to the product token.
const PURPOSE: &str = "archival-pdf-downloader";

/// User-Agent carrying an optional operator contact (mail or URL).
#[must_use]
pub(crate) fn user_agent_with_contact(contact: Option<&str>) -> String {
    let name = env!("CARGO_PKG_NAME");
    let version = env!("CARGO_PKG_VERSION");
    match contact.map(str::trim).filter(|c| !c.is_empty()) {
        Some(contact) => format!("{name}/{version} ({PURPOSE}; +{contact})"),
        None => format!("{name}/{version} ({PURPOSE})"),
    }
}
