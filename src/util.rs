use chrono::{SecondsFormat, Utc};
use sha1::{Digest as _, Sha1};
use sha2::Sha256;

/// Hex-encoded sha1 of the given bytes.
pub fn sha1_hex(bytes: &[u8]) -> String {
    let mut hasher = Sha1::new();
    hasher.update(bytes);
    format!("{:x}", hasher.finalize())
}

/// Hex-encoded sha256 of the given bytes.
pub fn sha256_hex(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    format!("{:x}", hasher.finalize())
}

/// Content-addressed scenario slug: sha1 over command, options, and args,
/// truncated to 10 hex chars. Sequence order is part of the identity.
pub fn scenario_slug(command: &str, options: &[String], args: &[String]) -> String {
    let mut hasher = Sha1::new();
    hasher.update(command.as_bytes());
    hasher.update(options.join("_").as_bytes());
    hasher.update(args.join("_").as_bytes());
    let digest = format!("{:x}", hasher.finalize());
    digest[..10].to_string()
}

/// Current UTC time as an RFC 3339 timestamp with a trailing `Z`.
pub fn now_utc_rfc3339() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn strings(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn scenario_slug_is_stable_for_identical_inputs() {
        let a = scenario_slug("grep", &strings(&["--color=auto"]), &strings(&["file.txt"]));
        let b = scenario_slug("grep", &strings(&["--color=auto"]), &strings(&["file.txt"]));
        assert_eq!(a, b);
        assert_eq!(a.len(), 10);
        assert!(a.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn scenario_slug_differs_when_any_part_differs() {
        let base = scenario_slug("ls", &strings(&["-l"]), &strings(&["."]));
        assert_ne!(base, scenario_slug("ls", &strings(&["-a"]), &strings(&["."])));
        assert_ne!(base, scenario_slug("ls", &strings(&["-l"]), &strings(&["/tmp"])));
        assert_ne!(base, scenario_slug("cat", &strings(&["-l"]), &strings(&["."])));
    }

    #[test]
    fn scenario_slug_treats_order_as_significant() {
        let ab = scenario_slug("ls", &strings(&["-a", "-b"]), &[]);
        let ba = scenario_slug("ls", &strings(&["-b", "-a"]), &[]);
        assert_ne!(ab, ba);
    }
}
