//! Utility functions for flowcoord

use percent_encoding::{utf8_percent_encode, AsciiSet, CONTROLS};

/// Percent-encoding set for resource ids placed in a URI path segment
const ID_ENCODE_SET: &AsciiSet = &CONTROLS
    .add(b'/')
    .add(b'%')
    .add(b' ')
    .add(b'?')
    .add(b'#')
    .add(b'&');

/// Encode a resource id for use as a URI path segment
pub fn encode_id(id: &str) -> String {
    utf8_percent_encode(id, ID_ENCODE_SET).to_string()
}

/// `{base_url}/{collection}/{id}`, tolerating a trailing slash on the base
pub fn resource_uri(base_url: &str, collection: &str, id: &str) -> String {
    format!(
        "{}/{}/{}",
        base_url.trim_end_matches('/'),
        collection,
        encode_id(id)
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encode_id() {
        assert_eq!(encode_id("simple"), "simple");
        assert_eq!(encode_id("a/b c"), "a%2Fb%20c");
    }

    #[test]
    fn test_resource_uri() {
        assert_eq!(
            resource_uri("http://h:8080/", "input-ports", "p 1"),
            "http://h:8080/input-ports/p%201"
        );
    }
}
