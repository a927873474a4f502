/// Separator used when flattening detected technologies into one column.
pub const TECHNOLOGY_SEPARATOR: &str = ", ";

/// Raw JSON stored for hostnames the probe returned nothing for.
pub const NO_RESPONSE_JSON: &str = r#"{"failed":true,"error":"no response on probed ports"}"#;

/// One JSON line emitted by the probe binary for one input hostname.
///
/// Field names follow the probe's JSON-lines output. Everything except the
/// input is optional on the wire; missing values decode to their empty form.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct ProbeObservation {
    pub input: String,
    pub url: String,
    pub status_code: Option<u16>,
    pub content_length: Option<i64>,
    pub title: String,
    pub webserver: String,
    pub tech: Vec<String>,
    /// The undecoded line this observation came from.
    #[cfg_attr(feature = "serde", serde(skip))]
    pub raw: String,
}

impl ProbeObservation {
    /// Scheme portion of the resulting URL, if it has one.
    pub fn scheme(&self) -> Option<&str> {
        self.url.split_once("://").map(|(scheme, _)| scheme)
    }

    pub fn is_https(&self) -> bool {
        self.scheme()
            .is_some_and(|scheme| scheme.eq_ignore_ascii_case("https"))
    }

    pub fn has_success_status(&self) -> bool {
        matches!(self.status_code, Some(200..=299))
    }

    pub fn has_title(&self) -> bool {
        !self.title.trim().is_empty()
    }

    pub fn has_status(&self) -> bool {
        self.status_code.is_some_and(|code| code != 0)
    }

    pub fn tech_count(&self) -> usize {
        self.tech.len()
    }
}

/// Durable per-hostname probe record handed to the target store.
///
/// Written once per hostname per run, in a single call.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct PersistedProbeResult {
    pub status_code: Option<i32>,
    pub content_length: Option<i64>,
    pub title: String,
    pub server: String,
    pub technologies: String,
    pub raw_json: String,
}

impl PersistedProbeResult {
    /// Placeholder for a hostname that was probed but produced no output, so
    /// it reads as attempted rather than never scanned.
    pub fn no_response() -> Self {
        Self {
            status_code: None,
            content_length: None,
            title: String::new(),
            server: String::new(),
            technologies: String::new(),
            raw_json: NO_RESPONSE_JSON.to_string(),
        }
    }

    pub fn is_no_response(&self) -> bool {
        self.raw_json == NO_RESPONSE_JSON
    }
}

impl From<&ProbeObservation> for PersistedProbeResult {
    fn from(observation: &ProbeObservation) -> Self {
        Self {
            status_code: observation
                .status_code
                .filter(|code| *code != 0)
                .map(i32::from),
            content_length: observation.content_length,
            title: observation.title.trim().to_string(),
            server: observation.webserver.trim().to_string(),
            technologies: observation.tech.join(TECHNOLOGY_SEPARATOR),
            raw_json: observation.raw.clone(),
        }
    }
}
