use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};

/// One row of the `fns_logs` table: a single flow event as reported by the
/// policy enforcement point and ingested by the external syslog pipeline.
///
/// Records are append-only; nothing in this crate ever updates one.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FlowEventRecord {
    pub id: u64,
    /// Ingestion instant, microsecond precision. Primary ordering and
    /// retention key.
    pub received_timestamp: DateTime<Utc>,
    pub hostname: String,
    pub os: String,
    /// Instant the device recorded the event (second precision, source
    /// clock). Never used for retention decisions.
    pub event_timestamp: DateTime<Utc>,
    pub rule_uuid: String,
    pub rule_name: String,
    pub event_type: String,
    pub source: String,
    pub destination: String,
    pub protocol: String,
    pub source_port: u16,
    pub destination_port: u16,
    pub action: String,
    pub direction: String,
    pub originator_packets: u64,
    pub originator_bytes: u64,
    pub reply_packets: u64,
    pub reply_bytes: u64,
    pub description: Option<String>,
}

/// A flow event about to be inserted; the store assigns the id.
#[derive(Debug, Clone)]
pub struct NewFlowEvent {
    pub received_timestamp: DateTime<Utc>,
    pub hostname: String,
    pub os: String,
    pub event_timestamp: DateTime<Utc>,
    pub rule_uuid: String,
    pub rule_name: String,
    pub event_type: String,
    pub source: String,
    pub destination: String,
    pub protocol: String,
    pub source_port: u16,
    pub destination_port: u16,
    pub action: String,
    pub direction: String,
    pub originator_packets: u64,
    pub originator_bytes: u64,
    pub reply_packets: u64,
    pub reply_bytes: u64,
    pub description: Option<String>,
}

/// Optional criteria for viewer queries. Text fields match as substrings,
/// `action` and `protocol` as exact values. Every value is passed to the
/// store as a bound parameter.
#[derive(Debug, Clone, Default)]
pub struct LogFilter {
    pub hostname: Option<String>,
    pub source: Option<String>,
    pub destination: Option<String>,
    pub action: Option<String>,
    pub protocol: Option<String>,
    pub rule_name: Option<String>,
    pub received_after: Option<DateTime<Utc>>,
    pub received_before: Option<DateTime<Utc>>,
}

/// Whitelist of sortable columns. Sort parameters from the outside world are
/// mapped through this enum so caller text never reaches the ORDER BY clause.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortColumn {
    Id,
    #[default]
    ReceivedTimestamp,
    Hostname,
    Os,
    EventTimestamp,
    RuleUuid,
    RuleName,
    EventType,
    Source,
    Destination,
    Protocol,
    SourcePort,
    DestinationPort,
    Action,
    Direction,
    OriginatorPackets,
    OriginatorBytes,
    ReplyPackets,
    ReplyBytes,
}

impl SortColumn {
    pub fn parse(name: &str) -> Option<Self> {
        let col = match name {
            "id" => SortColumn::Id,
            "received_timestamp" => SortColumn::ReceivedTimestamp,
            "hostname" => SortColumn::Hostname,
            "os" => SortColumn::Os,
            "event_timestamp" => SortColumn::EventTimestamp,
            "rule_uuid" => SortColumn::RuleUuid,
            "rule_name" => SortColumn::RuleName,
            "event_type" => SortColumn::EventType,
            "source" => SortColumn::Source,
            "destination" => SortColumn::Destination,
            "protocol" => SortColumn::Protocol,
            "source_port" => SortColumn::SourcePort,
            "destination_port" => SortColumn::DestinationPort,
            "action" => SortColumn::Action,
            "direction" => SortColumn::Direction,
            "originator_packets" => SortColumn::OriginatorPackets,
            "originator_bytes" => SortColumn::OriginatorBytes,
            "reply_packets" => SortColumn::ReplyPackets,
            "reply_bytes" => SortColumn::ReplyBytes,
            _ => return None,
        };
        Some(col)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            SortColumn::Id => "id",
            SortColumn::ReceivedTimestamp => "received_timestamp",
            SortColumn::Hostname => "hostname",
            SortColumn::Os => "os",
            SortColumn::EventTimestamp => "event_timestamp",
            SortColumn::RuleUuid => "rule_uuid",
            SortColumn::RuleName => "rule_name",
            SortColumn::EventType => "event_type",
            SortColumn::Source => "source",
            SortColumn::Destination => "destination",
            SortColumn::Protocol => "protocol",
            SortColumn::SourcePort => "source_port",
            SortColumn::DestinationPort => "destination_port",
            SortColumn::Action => "action",
            SortColumn::Direction => "direction",
            SortColumn::OriginatorPackets => "originator_packets",
            SortColumn::OriginatorBytes => "originator_bytes",
            SortColumn::ReplyPackets => "reply_packets",
            SortColumn::ReplyBytes => "reply_bytes",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortOrder {
    Asc,
    #[default]
    Desc,
}

impl SortOrder {
    pub fn parse(name: &str) -> Option<Self> {
        match name.to_ascii_uppercase().as_str() {
            "ASC" => Some(SortOrder::Asc),
            "DESC" => Some(SortOrder::Desc),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            SortOrder::Asc => "ASC",
            SortOrder::Desc => "DESC",
        }
    }
}

/// Grouping key for traffic summaries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GroupBy {
    Source,
    Destination,
    DestinationPort,
    RuleName,
}

impl GroupBy {
    pub fn column(&self) -> &'static str {
        match self {
            GroupBy::Source => "source",
            GroupBy::Destination => "destination",
            GroupBy::DestinationPort => "destination_port",
            GroupBy::RuleName => "rule_name",
        }
    }
}

/// One group of a traffic summary, ordered by `total_bytes` descending.
#[derive(Debug, Clone, Serialize)]
pub struct TrafficBucket {
    pub key: String,
    pub total_bytes: u64,
    pub connection_count: u64,
}

/// Distinct column values used to populate the viewer's filter dropdowns.
#[derive(Debug, Clone, Serialize)]
pub struct FilterOptions {
    pub hostnames: Vec<String>,
    pub actions: Vec<String>,
    pub protocols: Vec<String>,
    pub rule_names: Vec<String>,
}

/// Store metrics over the retention window.
#[derive(Debug, Clone, Serialize)]
pub struct LogStatistics {
    pub total_records: u64,
    pub oldest_timestamp: Option<String>,
    pub newest_timestamp: Option<String>,
    pub avg_per_minute: f64,
    pub avg_per_hour: f64,
    pub avg_per_day: f64,
    pub retention_days: i64,
    pub cutoff_date: String,
}

const RECEIVED_FORMAT: &str = "%Y-%m-%d %H:%M:%S%.6f";
const EVENT_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Render `received_timestamp` for storage (microsecond precision). The
/// format sorts and compares correctly as text on SQLite and coerces to
/// DATETIME(6) on MySQL.
pub(crate) fn format_received(t: &DateTime<Utc>) -> String {
    t.format(RECEIVED_FORMAT).to_string()
}

/// Render `event_timestamp` for storage (second precision, source clock).
pub(crate) fn format_event(t: &DateTime<Utc>) -> String {
    t.format(EVENT_FORMAT).to_string()
}

pub(crate) fn parse_received(s: &str) -> Option<DateTime<Utc>> {
    NaiveDateTime::parse_from_str(s, RECEIVED_FORMAT)
        .ok()
        .map(|n| n.and_utc())
}

pub(crate) fn parse_event(s: &str) -> Option<DateTime<Utc>> {
    NaiveDateTime::parse_from_str(s, EVENT_FORMAT)
        .ok()
        .map(|n| n.and_utc())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_received_format_keeps_microseconds() {
        let t = Utc
            .with_ymd_and_hms(2024, 3, 1, 12, 30, 45)
            .unwrap()
            .checked_add_signed(chrono::Duration::microseconds(123456))
            .unwrap();
        let s = format_received(&t);
        assert_eq!(s, "2024-03-01 12:30:45.123456");
        assert_eq!(parse_received(&s).unwrap(), t);
    }

    #[test]
    fn test_received_format_orders_lexicographically() {
        let earlier = Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).unwrap();
        let later = earlier + chrono::Duration::microseconds(1);
        assert!(format_received(&earlier) < format_received(&later));
    }

    #[test]
    fn test_event_format_is_second_precision() {
        let t = Utc.with_ymd_and_hms(2024, 3, 1, 12, 30, 45).unwrap();
        let s = format_event(&t);
        assert_eq!(s, "2024-03-01 12:30:45");
        assert_eq!(parse_event(&s).unwrap(), t);
    }

    #[test]
    fn test_sort_column_whitelist() {
        assert_eq!(SortColumn::parse("hostname"), Some(SortColumn::Hostname));
        assert_eq!(SortColumn::parse("received_timestamp; DROP TABLE fns_logs"), None);
        assert_eq!(SortColumn::parse(""), None);
        assert_eq!(SortOrder::parse("desc"), Some(SortOrder::Desc));
        assert_eq!(SortOrder::parse("sideways"), None);
    }
}
