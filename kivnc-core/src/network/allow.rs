//! Address allow-list.
//!
//! Entries are prefixes of the textual address form, so `192.168.0.`
//! admits the whole /24 and `10.` the whole /8. IPv4-mapped IPv6 peers
//! (`::ffff:a.b.c.d`) are matched by their IPv4 form. `*` admits every
//! address; an empty list admits none.

use std::net::IpAddr;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AllowList {
    prefixes: Vec<String>,
}

impl AllowList {
    pub fn new<I, S>(prefixes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            prefixes: prefixes
                .into_iter()
                .map(|p| {
                    let p: String = p.into();
                    p.trim().to_string()
                })
                .filter(|p| !p.is_empty())
                .collect(),
        }
    }

    /// Whether `ip` matches any entry.
    pub fn permits(&self, ip: IpAddr) -> bool {
        let text = ip.to_canonical().to_string();
        self.prefixes
            .iter()
            .any(|prefix| prefix == "*" || text.starts_with(prefix.as_str()))
    }

    pub fn prefixes(&self) -> &[String] {
        &self.prefixes
    }

    pub fn is_empty(&self) -> bool {
        self.prefixes.is_empty()
    }
}
