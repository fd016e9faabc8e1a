//! Dialogue segmentation: script text → ordered speaker-tagged segments.
//!
//! Each non-blank line becomes at most one segment. A `Host:` or `Guest:`
//! prefix (ASCII case-insensitive) selects the speaker and is stripped;
//! any other line is read by the host verbatim.

use serde::Serialize;
use std::fmt;

/// The two voices of a generated podcast.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Speaker {
    Host,
    Guest,
}

impl Speaker {
    /// Script label, without the colon.
    pub fn label(self) -> &'static str {
        match self {
            Speaker::Host => "Host",
            Speaker::Guest => "Guest",
        }
    }

    /// Logical voice identity carried on each segment.
    pub fn voice_id(self) -> &'static str {
        match self {
            Speaker::Host => "host",
            Speaker::Guest => "guest",
        }
    }
}

impl fmt::Display for Speaker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// One speaker-attributed line of a script.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Segment {
    pub speaker: Speaker,
    pub text: String,
    pub voice_id: &'static str,
}

impl Segment {
    pub fn new(speaker: Speaker, text: impl Into<String>) -> Self {
        Self {
            speaker,
            text: text.into(),
            voice_id: speaker.voice_id(),
        }
    }
}

/// Split a script into segments, in line order.
pub fn segment(script: &str) -> Vec<Segment> {
    script.lines().filter_map(parse_line).collect()
}

fn parse_line(line: &str) -> Option<Segment> {
    let line = line.trim();
    if line.is_empty() {
        return None;
    }
    for speaker in [Speaker::Host, Speaker::Guest] {
        if let Some(rest) = strip_label(line, speaker.label()) {
            let rest = rest.trim();
            return (!rest.is_empty()).then(|| Segment::new(speaker, rest));
        }
    }
    Some(Segment::new(Speaker::Host, line))
}

/// `line` minus a leading `label:`, compared ASCII case-insensitively.
fn strip_label<'a>(line: &'a str, label: &str) -> Option<&'a str> {
    let name = line.get(..label.len())?;
    let rest = line.get(label.len()..)?.strip_prefix(':')?;
    name.eq_ignore_ascii_case(label).then_some(rest)
}
