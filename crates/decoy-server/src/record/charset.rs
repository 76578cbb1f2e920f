//! Response body decoding for recordings.

use encoding_rs::{Encoding, UTF_8};
use tracing::{debug, warn};

/// Recorded body, split the way a `Response` stores it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DecodedBody {
    Text(String),
    Bytes(Vec<u8>),
}

/// Media type of a content-type header, lowercased and without parameters
pub fn media_type(content_type: &str) -> String {
    content_type
        .split(';')
        .next()
        .unwrap_or_default()
        .trim()
        .to_ascii_lowercase()
}

/// Encoding named by the content-type `charset` parameter. Any WHATWG label
/// is accepted; missing or unknown charsets fall back to UTF-8.
pub fn charset_of(content_type: &str) -> &'static Encoding {
    for param in content_type.split(';').skip(1) {
        let Some((key, value)) = param.split_once('=') else {
            continue;
        };
        if !key.trim().eq_ignore_ascii_case("charset") {
            continue;
        }
        let label = value.trim().trim_matches('"');
        match Encoding::for_label(label.as_bytes()) {
            Some(encoding) => {
                debug!("Found charset {} ({})", label, encoding.name());
                return encoding;
            }
            None => warn!("Unsupported charset {}, defaulting to UTF-8", label),
        }
    }
    UTF_8
}

/// Pick the body representation for a recorded response.
///
/// Octet streams stay raw. Textual types are decoded with their declared
/// charset; a body that does not decode becomes an empty text body. Anything
/// else is read as lossy UTF-8.
pub fn decode_body(content_type: &str, body: &[u8]) -> DecodedBody {
    match media_type(content_type).as_str() {
        "application/octet-stream" => DecodedBody::Bytes(body.to_vec()),
        "text/plain" | "text/html" | "text/xml" | "application/xml" | "application/json" => {
            let encoding = charset_of(content_type);
            match encoding.decode_without_bom_handling_and_without_replacement(body) {
                Some(text) => DecodedBody::Text(text.into_owned()),
                None => {
                    warn!("Could not decode body as {}", encoding.name());
                    DecodedBody::Text(String::new())
                }
            }
        }
        other => {
            debug!("Received content type {:?}, defaulting to string", other);
            DecodedBody::Text(String::from_utf8_lossy(body).into_owned())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use encoding_rs::{KOI8_R, SHIFT_JIS, WINDOWS_1252};

    #[test]
    fn test_media_type() {
        assert_eq!(
            media_type("Application/JSON; charset=utf-8"),
            "application/json"
        );
        assert_eq!(media_type(""), "");
    }

    #[test]
    fn test_charset_lookup() {
        assert_eq!(charset_of("text/plain; charset=ISO-8859-1"), WINDOWS_1252);
        assert_eq!(charset_of("text/plain;charset=\"Shift_JIS\""), SHIFT_JIS);
        assert_eq!(charset_of("text/plain; charset=koi8-r"), KOI8_R);
        assert_eq!(charset_of("text/plain; charset=x-made-up"), UTF_8);
        assert_eq!(charset_of("text/plain"), UTF_8);
    }

    #[test]
    fn test_octet_stream_stays_raw() {
        let body = [0xff, 0x00, 0x10];
        assert_eq!(
            decode_body("application/octet-stream", &body),
            DecodedBody::Bytes(body.to_vec())
        );
    }

    #[test]
    fn test_latin1_text() {
        assert_eq!(
            decode_body("text/plain; charset=iso-8859-1", b"caf\xe9"),
            DecodedBody::Text("café".to_string())
        );
    }

    #[test]
    fn test_invalid_utf8_json_is_empty() {
        assert_eq!(
            decode_body("application/json", b"{\"a\":\"\xff\"}"),
            DecodedBody::Text(String::new())
        );
    }

    #[test]
    fn test_legacy_charsets_are_decoded() {
        assert_eq!(
            decode_body("text/plain; charset=windows-1252", b"\x80 5"),
            DecodedBody::Text("\u{20ac} 5".to_string())
        );
        assert_eq!(
            decode_body("text/html; charset=shift_jis", b"\x82\xa0"),
            DecodedBody::Text("\u{3042}".to_string())
        );
        assert_eq!(
            decode_body("application/json; charset=utf-16le", b"{\x00}\x00"),
            DecodedBody::Text("{}".to_string())
        );
    }

    #[test]
    fn test_malformed_legacy_body_is_empty() {
        assert_eq!(
            decode_body("text/plain; charset=shift_jis", b"\x82"),
            DecodedBody::Text(String::new())
        );
    }

    #[test]
    fn test_unknown_type_is_lossy_text() {
        assert_eq!(
            decode_body("image/svg+xml", b"<svg/>\xff"),
            DecodedBody::Text("<svg/>\u{fffd}".to_string())
        );
    }
}
