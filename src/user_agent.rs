//! User-Agent string sent with every WebDAV request.

/// Product token used in the User-Agent header.
const PRODUCT: &str = "davbench";

/// Default User-Agent for benchmark traffic (identifies the tool and version).
///
/// Server-side access logs can then tell benchmark load apart from real
/// sync clients.
#[must_use]
pub(crate) fn default_user_agent() -> String {
    let version = env!("CARGO_PKG_VERSION");
    format!("{PRODUCT}/{version} (webdav-throughput-benchmark)")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_user_agent_contains_product_and_version() {
        let ua = default_user_agent();
        assert_eq!(
            env!("CARGO_PKG_VERSION"),
            ua.strip_prefix("davbench/")
                .and_then(|s| s.split(' ').next())
                .expect("UA has version"),
            "UA must contain crate version"
        );
        assert!(ua.contains("webdav-throughput-benchmark"), "got: {ua}");
    }
}
