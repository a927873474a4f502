use std::collections::HashMap;

use recon_model::{ProbeObservation, normalize_hostname};
use tracing::warn;
use url::Url;

const MAX_LOGGED_LINE: usize = 200;

/// Observations from one invocation, grouped by normalized input hostname in
/// the order the probe emitted them.
#[derive(Debug, Default)]
pub struct ObservationSet {
    by_input: HashMap<String, Vec<ProbeObservation>>,
    dropped: usize,
}

impl ObservationSet {
    /// Decodes one raw stdout line. Invalid UTF-8 is replaced rather than
    /// rejected, so such a line fails JSON decoding and is dropped like any
    /// other malformed line.
    pub fn push_bytes(&mut self, line: &[u8]) {
        self.push_line(&String::from_utf8_lossy(line));
    }

    /// Decodes one stdout line. Blank lines are ignored; malformed lines are
    /// logged and counted, never fatal.
    pub fn push_line(&mut self, line: &str) {
        let trimmed = line.trim();
        if trimmed.is_empty() {
            return;
        }

        match decode_line(trimmed) {
            Ok(observation) => match observation_key(&observation) {
                Some(key) => self.by_input.entry(key).or_default().push(observation),
                None => {
                    self.dropped += 1;
                    warn!(
                        line = %truncate(trimmed),
                        "probe output line has neither input nor url; dropped"
                    );
                }
            },
            Err(err) => {
                self.dropped += 1;
                warn!(
                    error = %err,
                    line = %truncate(trimmed),
                    "failed to decode probe output line; dropped"
                );
            }
        }
    }

    /// Observations recorded for `hostname`, in emission order.
    pub fn for_hostname(&self, hostname: &str) -> &[ProbeObservation] {
        self.by_input
            .get(&normalize_hostname(hostname))
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    /// Number of distinct hostnames with at least one observation.
    pub fn hostnames(&self) -> usize {
        self.by_input.len()
    }

    pub fn observations(&self) -> usize {
        self.by_input.values().map(Vec::len).sum()
    }

    pub fn dropped(&self) -> usize {
        self.dropped
    }
}

/// Parses one JSON line into an observation, keeping the line as `raw`.
pub fn decode_line(line: &str) -> Result<ProbeObservation, serde_json::Error> {
    let mut observation: ProbeObservation = serde_json::from_str(line)?;
    observation.raw = line.to_string();
    Ok(observation)
}

/// The input echoed by the probe, falling back to the URL host when a probe
/// build omits it.
fn observation_key(observation: &ProbeObservation) -> Option<String> {
    let input = normalize_hostname(&observation.input);
    if !input.is_empty() {
        return Some(input);
    }

    Url::parse(&observation.url)
        .ok()
        .and_then(|url| url.host_str().map(normalize_hostname))
        .filter(|host| !host.is_empty())
}

fn truncate(line: &str) -> &str {
    match line.char_indices().nth(MAX_LOGGED_LINE) {
        Some((idx, _)) => &line[..idx],
        None => line,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn groups_lines_by_input() {
        let mut set = ObservationSet::default();
        set.push_line(
            r#"{"input":"a.example.com","url":"http://a.example.com","status_code":200}"#,
        );
        set.push_line(
            r#"{"input":"a.example.com","url":"https://a.example.com","status_code":403}"#,
        );
        set.push_line(
            r#"{"input":"b.example.com","url":"https://b.example.com","title":"B","tech":["Nginx"]}"#,
        );

        assert_eq!(set.hostnames(), 2);
        assert_eq!(set.observations(), 3);
        let a = set.for_hostname("A.example.com");
        assert_eq!(a.len(), 2);
        assert_eq!(a[0].url, "http://a.example.com");
        assert_eq!(set.for_hostname("b.example.com")[0].tech, vec!["Nginx"]);
    }

    #[test]
    fn malformed_lines_are_dropped_not_fatal() {
        let mut set = ObservationSet::default();
        set.push_line("not json at all");
        set.push_line("");
        set.push_line(r#"{"input":"ok.example.com","url":"http://ok"}"#);

        assert_eq!(set.dropped(), 1);
        assert_eq!(set.for_hostname("ok.example.com").len(), 1);
    }

    #[test]
    fn invalid_utf8_line_is_dropped() {
        let mut set = ObservationSet::default();
        set.push_bytes(b"\xff\xfe garbage\r");
        set.push_bytes(br#"{"input":"ok.example.com","url":"http://ok"}"#);

        assert_eq!(set.dropped(), 1);
        assert_eq!(set.observations(), 1);
        assert_eq!(set.for_hostname("ok.example.com").len(), 1);
    }

    #[test]
    fn raw_line_is_preserved() {
        let line = r#"{"input":"x.example.com","url":"https://x.example.com","webserver":"nginx"}"#;
        let observation = decode_line(line).expect("decode");
        assert_eq!(observation.raw, line);
        assert_eq!(observation.webserver, "nginx");
        assert_eq!(observation.status_code, None);
    }

    #[test]
    fn missing_input_falls_back_to_url_host() {
        let mut set = ObservationSet::default();
        set.push_line(r#"{"url":"https://Fallback.example.com:8443/login"}"#);
        set.push_line(r#"{"status_code":200}"#);

        assert_eq!(set.for_hostname("fallback.example.com").len(), 1);
        assert_eq!(set.dropped(), 1);
    }

    #[test]
    fn unknown_fields_are_ignored() {
        let observation = decode_line(
            r#"{"input":"y.example.com","url":"http://y.example.com","a":["1.2.3.4"],"port":"80"}"#,
        )
        .expect("decode");
        assert_eq!(observation.input, "y.example.com");
    }
}
