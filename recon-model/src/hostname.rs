use crate::ids::HostnameId;

/// One DNS name belonging to a target, as stored by the target store.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Hostname {
    pub id: HostnameId,
    pub name: String,
}

impl Hostname {
    pub fn new(id: HostnameId, name: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
        }
    }
}

/// Normalizes a hostname for comparison. Probe output echoes the input as it
/// was fed, but may differ in case or trailing dots.
pub fn normalize_hostname(raw: &str) -> String {
    raw.trim().trim_end_matches('.').to_ascii_lowercase()
}
