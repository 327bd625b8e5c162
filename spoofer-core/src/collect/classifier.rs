use crate::models::{FieldValue, SessionRecord};

/// Report page for a single session; the session id is appended.
pub const SESSION_REPORT_URL: &str = "https://spoofer.caida.org/report.php?sessionid=";

/// Placeholder for fields the API left out.
pub const MISSING_FIELD: &str = "N/A";

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Classification {
    pub routed: bool,
    pub private: bool,
}

impl Classification {
    pub fn is_match(&self) -> bool {
        self.routed || self.private
    }
}

/// A record that belongs in at least one output file, with the line to write.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MatchedRecord {
    pub classification: Classification,
    pub line: String,
}

/// Decide which outputs a record belongs to. Records without an IPv4 client
/// address never match.
pub fn classify(record: &SessionRecord) -> Classification {
    if !record.has_ipv4_client() {
        return Classification::default();
    }

    Classification {
        routed: record.routed_spoof_received(),
        private: record.private_spoof_received(),
    }
}

/// Classify and, for matches, format the output line.
pub fn match_record(record: &SessionRecord) -> Option<MatchedRecord> {
    let classification = classify(record);
    classification.is_match().then(|| MatchedRecord {
        classification,
        line: format_record(record),
    })
}

pub fn format_record(record: &SessionRecord) -> String {
    format!(
        "Session: {}{}, ASN4 number: {}, Client4: {}, Country: {}, Privatespoof: {}, Routedspoof: {}, Timestamp: {}",
        SESSION_REPORT_URL,
        display(&record.session),
        display(&record.asn4),
        display(&record.client4),
        display(&record.country),
        display(&record.privatespoof),
        display(&record.routedspoof),
        display(&record.timestamp),
    )
}

fn display(value: &Option<FieldValue>) -> String {
    value
        .as_ref()
        .map(ToString::to_string)
        .unwrap_or_else(|| MISSING_FIELD.to_string())
}
