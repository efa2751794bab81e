//! URL validation and domain derivation.
//!
//! A checkable URL is `http://` or `https://` followed by a hostname of at
//! least two labels whose last label looks like a TLD, an optional port,
//! and an optional path, query, or fragment. Anything else is rejected
//! before any store or network access happens.

use ::url::{Host, Url};

use crate::error::CheckError;

const MAX_HOST_LEN: usize = 253;
const MAX_LABEL_LEN: usize = 63;
const SCHEMES: [&str; 2] = ["https://", "http://"];

/// A URL that passed validation, with its derived domain.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidatedUrl {
    /// The input, trimmed.
    pub url: String,
    /// Lowercased hostname without scheme, port, or path.
    pub domain: String,
}

/// Validate a scheme-qualified URL and derive its domain.
pub fn validate(input: &str) -> Result<ValidatedUrl, CheckError> {
    let url = input.trim();
    let missing_scheme =
        || CheckError::InvalidUrl("please include 'http://' or 'https://'".to_string());
    if !has_http_scheme(url) {
        return Err(missing_scheme());
    }

    let parsed = Url::parse(url).map_err(|e| CheckError::InvalidUrl(e.to_string()))?;
    if !matches!(parsed.scheme(), "http" | "https") {
        return Err(missing_scheme());
    }
    if !parsed.username().is_empty() || parsed.password().is_some() {
        return Err(CheckError::InvalidUrl(
            "credentials are not allowed in the URL".to_string(),
        ));
    }

    let host = match parsed.host() {
        Some(Host::Domain(host)) => host,
        Some(Host::Ipv4(_)) | Some(Host::Ipv6(_)) => {
            return Err(CheckError::InvalidUrl(
                "IP addresses are not checkable, use a domain name".to_string(),
            ))
        }
        None => return Err(CheckError::InvalidUrl("missing host name".to_string())),
    };

    let domain = host.trim_end_matches('.').to_ascii_lowercase();
    check_host(&domain)?;

    Ok(ValidatedUrl {
        url: url.to_string(),
        domain,
    })
}

/// Prefix `https://` when the input has no scheme, as the search form does.
///
/// The result still has to pass [`validate`].
pub fn normalize_input(raw: &str) -> String {
    let trimmed = raw.trim();
    if has_http_scheme(trimmed) {
        trimmed.to_string()
    } else {
        format!("https://{}", trimmed)
    }
}

fn has_http_scheme(url: &str) -> bool {
    SCHEMES.iter().any(|scheme| {
        url.get(..scheme.len())
            .is_some_and(|prefix| prefix.eq_ignore_ascii_case(scheme))
    })
}

fn check_host(host: &str) -> Result<(), CheckError> {
    if host.is_empty() {
        return Err(CheckError::InvalidUrl("missing host name".to_string()));
    }
    if host.len() > MAX_HOST_LEN {
        return Err(CheckError::InvalidUrl("host name is too long".to_string()));
    }

    let labels: Vec<&str> = host.split('.').collect();
    if labels.len() < 2 {
        return Err(CheckError::InvalidUrl(format!(
            "'{}' is not a fully qualified domain",
            host
        )));
    }

    for label in &labels {
        if !valid_label(label) {
            return Err(CheckError::InvalidUrl(format!(
                "'{}' is not a valid host name",
                host
            )));
        }
    }

    // TLD: letters first, at least two characters (punycode "xn--" allowed).
    let tld = labels[labels.len() - 1];
    let tld_ok = tld.len() >= 2 && tld.starts_with(|c: char| c.is_ascii_alphabetic());
    if !tld_ok {
        return Err(CheckError::InvalidUrl(format!(
            "'{}' does not end in a valid top-level domain",
            host
        )));
    }
    Ok(())
}

fn valid_label(label: &str) -> bool {
    !label.is_empty()
        && label.len() <= MAX_LABEL_LEN
        && !label.starts_with('-')
        && !label.ends_with('-')
        && label.chars().all(|c| c.is_ascii_alphanumeric() || c == '-')
}
