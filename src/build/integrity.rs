use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;
use sha2::{Digest, Sha384};

/// Number of digest characters embedded in a versioned filename.
pub const HASH_PREFIX_LEN: usize = 16;

/// SHA-384 over `content`, standard base64 with padding.
///
/// This is exactly the value browsers compare against an `integrity` attribute,
/// so it must be computed over the bytes that end up on disk.
pub fn hash(content: &[u8]) -> String {
    let mut hasher = Sha384::new();
    hasher.update(content);
    STANDARD.encode(hasher.finalize())
}

/// `sha384-<digest>`, ready for an `integrity` attribute or a CSP source.
pub fn sri(digest: &str) -> String {
    format!("sha384-{digest}")
}

/// `<base>.<hash16>.min.<ext>`.
///
/// The prefix is taken from the base64 digest with `+` and `/` swapped for `-`
/// and `_`, otherwise a digest containing `/` would name a subdirectory.
pub fn versioned_name(base: &str, digest: &str, ext: &str) -> String {
    let prefix: String = digest
        .chars()
        .take(HASH_PREFIX_LEN)
        .map(|c| match c {
            '+' => '-',
            '/' => '_',
            other => other,
        })
        .collect();
    format!("{base}.{prefix}.min.{ext}")
}

/// `<base>.min.<ext>`, the stable name that always points at the latest build.
pub fn canonical_name(base: &str, ext: &str) -> String {
    format!("{base}.min.{ext}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hash_matches_known_sri_value() {
        // `printf 'alert(1)' | openssl dgst -sha384 -binary | openssl base64 -A`
        assert_eq!(
            hash(b"alert(1)"),
            "HT2E9NfWiuQ/w1PRai+hTyqW16NIoCGA/m8VQDUopfAtcz6YQjtsMmQd5uRbVDpW"
        );
    }

    #[test]
    fn hash_is_deterministic() {
        let a = hash(b".a{color:red}");
        let b = hash(b".a{color:red}");
        assert_eq!(a, b);
        assert_ne!(a, hash(b".a{color:blue}"));
        // 48 digest bytes encode to 64 base64 chars without padding.
        assert_eq!(a.len(), 64);
    }

    #[test]
    fn versioned_name_uses_sixteen_char_prefix() {
        let digest = "abcdefghijklmnopqrstuvwxyz";
        assert_eq!(
            versioned_name("widget", digest, "js"),
            "widget.abcdefghijklmnop.min.js"
        );
    }

    #[test]
    fn versioned_name_is_a_single_path_segment() {
        let name = versioned_name("widget", "ab+/cd+/ef+/gh+/ij", "css");
        assert_eq!(name, "widget.ab-_cd-_ef-_gh-_.min.css");
        assert!(!name.contains('/'));
    }

    #[test]
    fn versioned_name_is_pure_function_of_content() {
        let content = b"(()=>{console.log(1)})();";
        let first = versioned_name("widget", &hash(content), "js");
        let second = versioned_name("widget", &hash(content), "js");
        assert_eq!(first, second);
    }

    #[test]
    fn sri_prefixes_algorithm() {
        assert_eq!(sri("abc="), "sha384-abc=");
        assert_eq!(canonical_name("widget", "css"), "widget.min.css");
    }
}
