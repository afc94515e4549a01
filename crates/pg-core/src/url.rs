//! URL helpers for domain partitioning and external-link detection
//!
//! These functions avoid allocations where they can and work directly on
//! string slices.

// =============================================================================
// Host Extraction
// =============================================================================

/// Get the position after "://".
#[inline]
pub fn get_scheme_end(url: &str) -> Option<usize> {
    let bytes = url.as_bytes();
    let colon_pos = bytes.iter().position(|&b| b == b':')?;

    if bytes.len() > colon_pos + 2 && bytes[colon_pos + 1] == b'/' && bytes[colon_pos + 2] == b'/' {
        return Some(colon_pos + 3);
    }
    None
}

/// Get the start and end positions of the hostname in a URL.
#[inline]
pub fn get_host_position(url: &str) -> Option<(usize, usize)> {
    let scheme_end = get_scheme_end(url)?;
    host_span(url, scheme_end)
}

fn host_span(url: &str, start: usize) -> Option<(usize, usize)> {
    let bytes = url.as_bytes();

    // Skip userinfo
    let mut host_start = start;
    for (i, &b) in bytes.iter().enumerate().skip(start) {
        if b == b'@' {
            host_start = i + 1;
            break;
        }
        if b == b'/' {
            break;
        }
    }

    let mut host_end = bytes.len();
    for (i, &b) in bytes.iter().enumerate().skip(host_start) {
        if b == b'/' || b == b'?' || b == b'#' || b == b':' {
            host_end = i;
            break;
        }
    }

    if host_end <= host_start {
        return None;
    }
    Some((host_start, host_end))
}

/// Fast host extraction without allocations.
/// Returns a slice into the original URL.
#[inline]
pub fn extract_host(url: &str) -> Option<&str> {
    let (host_start, host_end) = get_host_position(url)?;
    Some(&url[host_start..host_end])
}

// =============================================================================
// Domains
// =============================================================================

/// Normalize a hostname into the partition key used by the pattern store.
/// Lowercases, drops a trailing dot and a leading `www.`.
pub fn normalize_domain(host: &str) -> String {
    let host = host.trim().trim_end_matches('.').to_ascii_lowercase();
    match host.strip_prefix("www.") {
        Some(rest) if !rest.is_empty() => rest.to_string(),
        _ => host,
    }
}

/// Domain partition key for a page URL. Falls back to the raw input when it
/// is not an absolute URL (callers may already pass a bare hostname).
pub fn domain_of(url: &str) -> String {
    match extract_host(url) {
        Some(host) => normalize_domain(host),
        None => normalize_domain(url),
    }
}

/// Whether a link target leaves the page's site.
///
/// Relative links, fragments and non-navigational schemes (`javascript:`,
/// `mailto:`, `tel:`) are internal. A subdomain of the page host counts as
/// internal too.
pub fn is_external_link(href: &str, page_host: &str) -> bool {
    let href = href.trim();
    let host = if let Some(rest) = href.strip_prefix("//") {
        host_span(rest, 0).map(|(s, e)| &rest[s..e])
    } else if get_scheme_end(href).is_some() {
        extract_host(href)
    } else {
        None
    };

    let Some(host) = host else {
        return false;
    };

    let link = normalize_domain(host);
    let page = normalize_domain(page_host);
    if page.is_empty() {
        return true;
    }
    !(link == page || link.ends_with(&format!(".{page}")))
}
