use log::warn;
use regex::Regex;

/// Built-in source-address pattern. The log format only ever carries IPv4
/// dotted quads, so this is not configurable.
pub const IPV4_PATTERN: &str = r"(\d+\.\d+\.\d+\.\d+)";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogEvent {
    pub ip: String,
    /// Session token used to route the user-facing notice; only extracted
    /// when a tid pattern is configured.
    pub session_id: Option<String>,
    pub username: String,
}

/// Turns raw log lines into structured events. Lines without the watch tag
/// are rejected before any regex runs.
pub struct Extractor {
    tag: String,
    ip_regex: Regex,
    tid_regex: Option<Regex>,
    username_regex: Regex,
}

impl Extractor {
    pub fn new(tag: String, tid_regex: Option<Regex>, username_regex: Regex) -> Self {
        let ip_regex = Regex::new(IPV4_PATTERN).expect("Fatal: Regex invalid");
        Self {
            tag,
            ip_regex,
            tid_regex,
            username_regex,
        }
    }

    /// First match per category. A tagged line missing the address or the
    /// username capture is malformed: logged and dropped, never fatal.
    pub fn extract(&self, line: &str) -> Option<LogEvent> {
        if !line.contains(&self.tag) {
            return None;
        }

        let ip = self.ip_regex.find(line).map(|m| m.as_str().to_string());
        let username = self
            .username_regex
            .captures(line)
            .and_then(|c| c.get(1))
            .map(|m| m.as_str().to_string());

        let (Some(ip), Some(username)) = (ip, username) else {
            warn!("invalid log entry format, IP or username missing: {}", line);
            return None;
        };

        let session_id = self
            .tid_regex
            .as_ref()
            .and_then(|re| re.captures(line))
            .and_then(|c| c.get(1))
            .map(|m| m.as_str().to_string());

        Some(LogEvent {
            ip,
            session_id,
            username,
        })
    }
}
