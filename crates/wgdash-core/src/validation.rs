//! Input checks applied before values are sent to the server.

use std::net::IpAddr;
use std::sync::OnceLock;

use regex::Regex;

/// Base64 of a 32-byte Curve25519 key, padding optional.
const WG_KEY_PATTERN: &str = r"^[A-Za-z0-9+/]{43}=?=?$";

fn wg_key_regex() -> &'static Regex {
    static WG_KEY: OnceLock<Regex> = OnceLock::new();
    WG_KEY.get_or_init(|| Regex::new(WG_KEY_PATTERN).expect("valid WireGuard key regex"))
}

/// Whether `key` has the shape of a WireGuard public or private key.
pub fn is_valid_wg_key(key: &str) -> bool {
    wg_key_regex().is_match(key)
}

/// Whether `ip` is a single IPv4 or IPv6 address. Surrounding whitespace is
/// ignored and IPv6 addresses may carry a `%zone` suffix.
pub fn is_valid_ip(ip: &str) -> bool {
    let ip = ip.trim();
    match ip.split_once('%') {
        Some((addr, zone)) => {
            !zone.is_empty() && matches!(addr.parse::<IpAddr>(), Ok(IpAddr::V6(_)))
        }
        None => ip.parse::<IpAddr>().is_ok(),
    }
}

/// Whether `cidr` is an address with a prefix length valid for its family,
/// e.g. `10.0.0.1/24` or `fd00::/64`.
pub fn is_valid_cidr(cidr: &str) -> bool {
    let Some((addr, prefix)) = cidr.trim().split_once('/') else {
        return false;
    };
    if prefix.is_empty() || !prefix.bytes().all(|b| b.is_ascii_digit()) {
        return false;
    }
    let Ok(prefix) = prefix.parse::<u8>() else {
        return false;
    };
    match addr.parse::<IpAddr>() {
        Ok(IpAddr::V4(_)) => prefix <= 32,
        Ok(IpAddr::V6(_)) => prefix <= 128,
        Err(_) => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_wg_key_length() {
        assert!(is_valid_wg_key("yAnz5TF+lXXJte14tji3zlMNq+hd2rYUIgJBgB3fBmk="));
        assert!(is_valid_wg_key("yAnz5TF+lXXJte14tji3zlMNq+hd2rYUIgJBgB3fBmk"));
        assert!(!is_valid_wg_key("yAnz5TF+lXXJte14tji3zlMNq+hd2rYUIgJBgB3fBm="));
        assert!(!is_valid_wg_key("yAnz5TF-lXXJte14tji3zlMNq+hd2rYUIgJBgB3fBmk="));
        assert!(!is_valid_wg_key("yAnz5TF+lXXJte14tji3zlMNq+hd2rYUIgJBgB3fBmk==="));
        assert!(!is_valid_wg_key(""));
    }

    #[test]
    fn test_ip_addresses() {
        assert!(is_valid_ip("10.0.0.1"));
        assert!(is_valid_ip(" 192.168.1.254 "));
        assert!(is_valid_ip("fd00::1"));
        assert!(is_valid_ip("fe80::1%eth0"));
        assert!(!is_valid_ip("10.0.0.256"));
        assert!(!is_valid_ip("10.0.0.1%eth0"));
        assert!(!is_valid_ip("fe80::1%"));
        assert!(!is_valid_ip("10.0.0.0/24"));
    }

    #[test]
    fn test_cidr() {
        assert!(is_valid_cidr("10.0.0.1/24"));
        assert!(is_valid_cidr("0.0.0.0/0"));
        assert!(is_valid_cidr("fd00::/64"));
        assert!(is_valid_cidr("::/128"));
        assert!(!is_valid_cidr("10.0.0.1"));
        assert!(!is_valid_cidr("10.0.0.1/33"));
        assert!(!is_valid_cidr("fd00::/129"));
        assert!(!is_valid_cidr("10.0.0.1/+8"));
        assert!(!is_valid_cidr("wg0/24"));
    }
}
