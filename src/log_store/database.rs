use std::sync::Once;

use chrono::{DateTime, Duration, Utc};
use sqlx::{any::AnyPoolOptions, AnyPool};

use crate::configuration::config::DbConfig;
use crate::error_handling::types::StoreError;
use crate::log_store::types::{
    format_event, format_received, parse_event, parse_received, FilterOptions, FlowEventRecord,
    GroupBy, LogFilter, LogStatistics, NewFlowEvent, SortColumn, SortOrder, TrafficBucket,
};

/// Backends the store can talk to. SQLite covers local and test use, MySQL
/// the shared deployment database populated by the syslog pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Backend {
    Sqlite,
    MySql,
}

// Internal row mapping for flow events to avoid manual try_get
#[derive(Debug, sqlx::FromRow)]
struct FlowEventRow {
    id: i64,
    received_timestamp: String,
    hostname: String,
    os: String,
    event_timestamp: String,
    rule_uuid: String,
    rule_name: String,
    event_type: String,
    source: String,
    destination: String,
    protocol: String,
    source_port: i64,
    destination_port: i64,
    action: String,
    direction: String,
    originator_packets: i64,
    originator_bytes: i64,
    reply_packets: i64,
    reply_bytes: i64,
    description: Option<String>,
}

impl FlowEventRow {
    fn into_record(self) -> Result<FlowEventRecord, StoreError> {
        let received_timestamp = parse_received(&self.received_timestamp)
            .ok_or_else(|| StoreError::query("decode fns_logs row", "bad received_timestamp"))?;
        let event_timestamp = parse_event(&self.event_timestamp)
            .ok_or_else(|| StoreError::query("decode fns_logs row", "bad event_timestamp"))?;
        Ok(FlowEventRecord {
            id: self.id as u64,
            received_timestamp,
            hostname: self.hostname,
            os: self.os,
            event_timestamp,
            rule_uuid: self.rule_uuid,
            rule_name: self.rule_name,
            event_type: self.event_type,
            source: self.source,
            destination: self.destination,
            protocol: self.protocol,
            source_port: self.source_port as u16,
            destination_port: self.destination_port as u16,
            action: self.action,
            direction: self.direction,
            originator_packets: self.originator_packets as u64,
            originator_bytes: self.originator_bytes as u64,
            reply_packets: self.reply_packets as u64,
            reply_bytes: self.reply_bytes as u64,
            description: self.description,
        })
    }
}

#[derive(Debug, sqlx::FromRow)]
struct TrafficRow {
    grp: String,
    total_bytes: i64,
    connection_count: i64,
}

static INSTALL_DRIVERS: Once = Once::new();

/// Async access to the shared `fns_logs` table.
///
/// Every method is a bounded set of statements over a pooled connection;
/// nothing here holds a connection past the call. All caller-supplied values
/// are bound parameters, never interpolated into query text.
#[derive(Debug)]
pub struct LogDatabase {
    pool: AnyPool,
    backend: Backend,
}

impl LogDatabase {
    /// Connect using the configured credentials.
    pub async fn connect(db: &DbConfig) -> Result<Self, StoreError> {
        Self::connect_url(&db.url()).await
    }

    /// Connect to an explicit database URL (`mysql://...` or `sqlite://...`).
    pub async fn connect_url(url: &str) -> Result<Self, StoreError> {
        INSTALL_DRIVERS.call_once(sqlx::any::install_default_drivers);
        let backend = if url.starts_with("mysql") {
            Backend::MySql
        } else {
            Backend::Sqlite
        };
        let pool = AnyPoolOptions::new()
            .max_connections(5)
            .connect(url)
            .await
            .map_err(|e| StoreError::ConnectionFailed(e.to_string()))?;
        Ok(Self { pool, backend })
    }

    /// Create the `fns_logs` table and its indexes if they do not exist.
    ///
    /// In production the schema is owned by the ingestion side; this exists
    /// for tests and the sample data generator.
    pub async fn apply_schema(&self) -> Result<(), StoreError> {
        let statements: &[&str] = match self.backend {
            Backend::Sqlite => &[
                "CREATE TABLE IF NOT EXISTS fns_logs (
                    id INTEGER PRIMARY KEY AUTOINCREMENT,
                    received_timestamp TEXT NOT NULL,
                    hostname TEXT NOT NULL,
                    os TEXT NOT NULL,
                    event_timestamp TEXT NOT NULL,
                    rule_uuid TEXT NOT NULL,
                    rule_name TEXT NOT NULL,
                    event_type TEXT NOT NULL,
                    source TEXT NOT NULL,
                    destination TEXT NOT NULL,
                    protocol TEXT NOT NULL,
                    source_port INTEGER NOT NULL,
                    destination_port INTEGER NOT NULL,
                    action TEXT NOT NULL,
                    direction TEXT NOT NULL,
                    originator_packets INTEGER NOT NULL,
                    originator_bytes INTEGER NOT NULL,
                    reply_packets INTEGER NOT NULL,
                    reply_bytes INTEGER NOT NULL,
                    description TEXT
                );",
                "CREATE INDEX IF NOT EXISTS idx_fns_logs_received ON fns_logs (received_timestamp);",
                "CREATE INDEX IF NOT EXISTS idx_fns_logs_event ON fns_logs (event_timestamp);",
                "CREATE INDEX IF NOT EXISTS idx_fns_logs_rule_uuid ON fns_logs (rule_uuid);",
                "CREATE INDEX IF NOT EXISTS idx_fns_logs_source ON fns_logs (source);",
                "CREATE INDEX IF NOT EXISTS idx_fns_logs_destination ON fns_logs (destination);",
            ],
            Backend::MySql => &[
                "CREATE TABLE IF NOT EXISTS fns_logs (
                    id BIGINT UNSIGNED NOT NULL AUTO_INCREMENT,
                    received_timestamp DATETIME(6) NOT NULL,
                    hostname VARCHAR(255) NOT NULL,
                    os VARCHAR(64) NOT NULL,
                    event_timestamp DATETIME NOT NULL,
                    rule_uuid CHAR(36) NOT NULL,
                    rule_name VARCHAR(255) NOT NULL,
                    event_type VARCHAR(64) NOT NULL,
                    source VARCHAR(45) NOT NULL,
                    destination VARCHAR(45) NOT NULL,
                    protocol VARCHAR(32) NOT NULL,
                    source_port INT UNSIGNED NOT NULL,
                    destination_port INT UNSIGNED NOT NULL,
                    action VARCHAR(32) NOT NULL,
                    direction VARCHAR(32) NOT NULL,
                    originator_packets BIGINT UNSIGNED NOT NULL,
                    originator_bytes BIGINT UNSIGNED NOT NULL,
                    reply_packets BIGINT UNSIGNED NOT NULL,
                    reply_bytes BIGINT UNSIGNED NOT NULL,
                    description TEXT,
                    PRIMARY KEY (id),
                    INDEX idx_fns_logs_received (received_timestamp),
                    INDEX idx_fns_logs_event (event_timestamp),
                    INDEX idx_fns_logs_rule_uuid (rule_uuid),
                    INDEX idx_fns_logs_source (source),
                    INDEX idx_fns_logs_destination (destination)
                );",
            ],
        };
        for sql in statements {
            sqlx::query(sql)
                .execute(&self.pool)
                .await
                .map_err(|e| StoreError::query("apply fns_logs schema", e))?;
        }
        Ok(())
    }

    /// Insert one flow event and return the id the store assigned.
    pub async fn insert_event(&self, event: &NewFlowEvent) -> Result<u64, StoreError> {
        // The assigned id must be read on the same connection as the insert.
        let mut conn = self
            .pool
            .acquire()
            .await
            .map_err(|e| StoreError::ConnectionFailed(e.to_string()))?;
        let result = sqlx::query(
            "INSERT INTO fns_logs (
                received_timestamp, hostname, os, event_timestamp, rule_uuid,
                rule_name, event_type, source, destination, protocol,
                source_port, destination_port, action, direction,
                originator_packets, originator_bytes, reply_packets, reply_bytes, description
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(format_received(&event.received_timestamp))
        .bind(&event.hostname)
        .bind(&event.os)
        .bind(format_event(&event.event_timestamp))
        .bind(&event.rule_uuid)
        .bind(&event.rule_name)
        .bind(&event.event_type)
        .bind(&event.source)
        .bind(&event.destination)
        .bind(&event.protocol)
        .bind(event.source_port as i64)
        .bind(event.destination_port as i64)
        .bind(&event.action)
        .bind(&event.direction)
        .bind(event.originator_packets as i64)
        .bind(event.originator_bytes as i64)
        .bind(event.reply_packets as i64)
        .bind(event.reply_bytes as i64)
        .bind(event.description.clone())
        .execute(&mut *conn)
        .await
        .map_err(|e| StoreError::query("insert into fns_logs", e))?;

        // The Any driver only surfaces last_insert_id on MySQL; SQLite has
        // to be asked directly.
        let id = match self.backend {
            Backend::MySql => result.last_insert_id(),
            Backend::Sqlite => Some(
                sqlx::query_scalar::<_, i64>("SELECT last_insert_rowid()")
                    .fetch_one(&mut *conn)
                    .await
                    .map_err(|e| StoreError::query("read assigned fns_logs id", e))?,
            ),
        };
        match id {
            Some(id) if id > 0 => Ok(id as u64),
            _ => Err(StoreError::query(
                "insert into fns_logs",
                "store did not report an assigned id",
            )),
        }
    }

    /// Fetch a page of events matching `filter` plus the total match count.
    pub async fn query_events(
        &self,
        filter: &LogFilter,
        sort: SortColumn,
        order: SortOrder,
        limit: i64,
        offset: i64,
    ) -> Result<(Vec<FlowEventRecord>, u64), StoreError> {
        let mut clauses: Vec<&'static str> = Vec::new();
        let mut binds: Vec<String> = Vec::new();
        if let Some(ref hostname) = filter.hostname {
            clauses.push("hostname LIKE ?");
            binds.push(format!("%{}%", hostname));
        }
        if let Some(ref source) = filter.source {
            clauses.push("source LIKE ?");
            binds.push(format!("%{}%", source));
        }
        if let Some(ref destination) = filter.destination {
            clauses.push("destination LIKE ?");
            binds.push(format!("%{}%", destination));
        }
        if let Some(ref action) = filter.action {
            clauses.push("action = ?");
            binds.push(action.clone());
        }
        if let Some(ref protocol) = filter.protocol {
            clauses.push("protocol = ?");
            binds.push(protocol.clone());
        }
        if let Some(ref rule_name) = filter.rule_name {
            clauses.push("rule_name LIKE ?");
            binds.push(format!("%{}%", rule_name));
        }
        if let Some(after) = filter.received_after {
            clauses.push("received_timestamp >= ?");
            binds.push(format_received(&after));
        }
        if let Some(before) = filter.received_before {
            clauses.push("received_timestamp <= ?");
            binds.push(format_received(&before));
        }

        let mut where_sql = String::new();
        if !clauses.is_empty() {
            where_sql.push_str(" WHERE ");
            where_sql.push_str(&clauses.join(" AND "));
        }

        let count_sql = format!("SELECT COUNT(*) FROM fns_logs{}", where_sql);
        let mut count_query = sqlx::query_scalar::<_, i64>(&count_sql);
        for b in &binds {
            count_query = count_query.bind(b);
        }
        let total = count_query
            .fetch_one(&self.pool)
            .await
            .map_err(|e| StoreError::query("count fns_logs", e))?;

        let select_sql = format!(
            "SELECT {} FROM fns_logs{} ORDER BY {} {} LIMIT ? OFFSET ?",
            self.select_columns(),
            where_sql,
            sort.as_str(),
            order.as_str(),
        );
        let mut select_query = sqlx::query_as::<_, FlowEventRow>(&select_sql);
        for b in &binds {
            select_query = select_query.bind(b);
        }
        let rows = select_query
            .bind(limit)
            .bind(offset)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| StoreError::query("select from fns_logs", e))?;

        let mut out = Vec::with_capacity(rows.len());
        for row in rows {
            out.push(row.into_record()?);
        }
        Ok((out, total as u64))
    }

    /// Distinct values for the viewer's filter dropdowns.
    pub async fn filter_options(&self) -> Result<FilterOptions, StoreError> {
        Ok(FilterOptions {
            hostnames: self.distinct("hostname").await?,
            actions: self.distinct("action").await?,
            protocols: self.distinct("protocol").await?,
            rule_names: self.distinct("rule_name").await?,
        })
    }

    async fn distinct(&self, column: &'static str) -> Result<Vec<String>, StoreError> {
        let sql = format!("SELECT DISTINCT {0} FROM fns_logs ORDER BY {0}", column);
        sqlx::query_scalar::<_, String>(&sql)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| StoreError::query("select distinct from fns_logs", e))
    }

    /// Count rows strictly older than `cutoff` (dry-run primitive).
    pub async fn count_older_than(&self, cutoff: DateTime<Utc>) -> Result<u64, StoreError> {
        let count = sqlx::query_scalar::<_, i64>(
            "SELECT COUNT(*) FROM fns_logs WHERE received_timestamp < ?",
        )
        .bind(format_received(&cutoff))
        .fetch_one(&self.pool)
        .await
        .map_err(|e| StoreError::query("count old fns_logs rows", e))?;
        Ok(count as u64)
    }

    /// Delete rows strictly older than `cutoff`, returning how many went.
    ///
    /// A row whose received_timestamp equals the cutoff survives.
    pub async fn delete_older_than(&self, cutoff: DateTime<Utc>) -> Result<u64, StoreError> {
        let result = sqlx::query("DELETE FROM fns_logs WHERE received_timestamp < ?")
            .bind(format_received(&cutoff))
            .execute(&self.pool)
            .await
            .map_err(|e| StoreError::query("delete old fns_logs rows", e))?;
        Ok(result.rows_affected())
    }

    /// Ask the storage engine to reclaim space freed by deletes.
    pub async fn compact(&self) -> Result<(), StoreError> {
        let sql = match self.backend {
            Backend::Sqlite => "VACUUM",
            Backend::MySql => "OPTIMIZE TABLE fns_logs",
        };
        sqlx::query(sql)
            .execute(&self.pool)
            .await
            .map_err(|e| StoreError::query("compact fns_logs", e))?;
        Ok(())
    }

    /// Traffic totals grouped by `group`, over completed (Destroy) events
    /// within the optional received-timestamp range, largest first.
    pub async fn traffic_summary(
        &self,
        group: GroupBy,
        received_after: Option<DateTime<Utc>>,
        received_before: Option<DateTime<Utc>>,
        limit: i64,
    ) -> Result<Vec<TrafficBucket>, StoreError> {
        let key_expr = match (group, self.backend) {
            (GroupBy::DestinationPort, Backend::Sqlite) => "CAST(destination_port AS TEXT)",
            (GroupBy::DestinationPort, Backend::MySql) => "CAST(destination_port AS CHAR)",
            _ => group.column(),
        };
        // SUM is DECIMAL on MySQL, so cast it back to an integer type.
        let sum_expr = match self.backend {
            Backend::Sqlite => {
                "CAST(COALESCE(SUM(originator_bytes + reply_bytes), 0) AS INTEGER)"
            }
            Backend::MySql => "CAST(COALESCE(SUM(originator_bytes + reply_bytes), 0) AS SIGNED)",
        };

        let mut clauses = vec!["event_type = 'Destroy'".to_string()];
        let mut binds: Vec<String> = Vec::new();
        if let Some(after) = received_after {
            clauses.push("received_timestamp >= ?".into());
            binds.push(format_received(&after));
        }
        if let Some(before) = received_before {
            clauses.push("received_timestamp <= ?".into());
            binds.push(format_received(&before));
        }

        let sql = format!(
            "SELECT {} AS grp, {} AS total_bytes, COUNT(*) AS connection_count
             FROM fns_logs WHERE {} GROUP BY {} ORDER BY total_bytes DESC LIMIT ?",
            key_expr,
            sum_expr,
            clauses.join(" AND "),
            group.column(),
        );
        let mut query = sqlx::query_as::<_, TrafficRow>(&sql);
        for b in &binds {
            query = query.bind(b);
        }
        let rows = query
            .bind(limit)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| StoreError::query("traffic summary over fns_logs", e))?;
        Ok(rows
            .into_iter()
            .map(|r| TrafficBucket {
                key: r.grp,
                total_bytes: r.total_bytes as u64,
                connection_count: r.connection_count as u64,
            })
            .collect())
    }

    /// Record counts and ingest rates over the retention window.
    pub async fn statistics(&self, retention_days: i64) -> Result<LogStatistics, StoreError> {
        let now = Utc::now();
        let cutoff = now - Duration::days(retention_days);
        let cutoff_str = format_received(&cutoff);

        let total_records = self.count_received_since(&cutoff_str).await?;

        let oldest_timestamp = sqlx::query_scalar::<_, Option<String>>(
            "SELECT MIN(received_timestamp) FROM fns_logs WHERE received_timestamp >= ?",
        )
        .bind(&cutoff_str)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| StoreError::query("min received_timestamp", e))?;
        let newest_timestamp = sqlx::query_scalar::<_, Option<String>>(
            "SELECT MAX(received_timestamp) FROM fns_logs WHERE received_timestamp >= ?",
        )
        .bind(&cutoff_str)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| StoreError::query("max received_timestamp", e))?;

        // Rate windows never reach past the retention cutoff.
        let hour_start = (now - Duration::hours(1)).max(cutoff);
        let hour_count = self.count_received_since(&format_received(&hour_start)).await?;

        let day_start = (now - Duration::days(1)).max(cutoff);
        let day_count = self.count_received_since(&format_received(&day_start)).await?;

        let week_days = retention_days.min(7);
        let week_start = (now - Duration::days(week_days)).max(cutoff);
        let week_count = self.count_received_since(&format_received(&week_start)).await?;

        Ok(LogStatistics {
            total_records,
            oldest_timestamp,
            newest_timestamp,
            avg_per_minute: hour_count as f64 / 60.0,
            avg_per_hour: day_count as f64 / 24.0,
            avg_per_day: week_count as f64 / week_days as f64,
            retention_days,
            cutoff_date: cutoff_str,
        })
    }

    async fn count_received_since(&self, since: &str) -> Result<u64, StoreError> {
        let count = sqlx::query_scalar::<_, i64>(
            "SELECT COUNT(*) FROM fns_logs WHERE received_timestamp >= ?",
        )
        .bind(since)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| StoreError::query("count fns_logs since", e))?;
        Ok(count as u64)
    }

    fn select_columns(&self) -> &'static str {
        match self.backend {
            Backend::Sqlite => {
                "id, received_timestamp, hostname, os, event_timestamp, rule_uuid, rule_name,
                 event_type, source, destination, protocol, source_port, destination_port,
                 action, direction, originator_packets, originator_bytes, reply_packets,
                 reply_bytes, description"
            }
            // MySQL DATETIME columns come back as text in the storage format.
            Backend::MySql => {
                "id, DATE_FORMAT(received_timestamp, '%Y-%m-%d %H:%i:%S.%f') AS received_timestamp,
                 hostname, os, DATE_FORMAT(event_timestamp, '%Y-%m-%d %H:%i:%S') AS event_timestamp,
                 rule_uuid, rule_name, event_type, source, destination, protocol, source_port,
                 destination_port, action, direction, originator_packets, originator_bytes,
                 reply_packets, reply_bytes, description"
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use tempfile::TempDir;
    use uuid::Uuid;

    async fn temp_db() -> LogDatabase {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("test.sqlite3");
        // Keep TempDir alive by leaking it for the test duration
        Box::leak(Box::new(dir));
        let url = format!("sqlite://{}?mode=rwc", path.display());
        let db = LogDatabase::connect_url(&url).await.unwrap();
        db.apply_schema().await.unwrap();
        db
    }

    fn event_at(received: DateTime<Utc>) -> NewFlowEvent {
        NewFlowEvent {
            received_timestamp: received,
            hostname: "ahv-host-1".into(),
            os: "ahv".into(),
            event_timestamp: received - Duration::seconds(2),
            rule_uuid: Uuid::new_v4().to_string(),
            rule_name: "Default Global Policy".into(),
            event_type: "Destroy".into(),
            source: "10.0.0.5".into(),
            destination: "192.168.1.10".into(),
            protocol: "TCP".into(),
            source_port: 51514,
            destination_port: 443,
            action: "ALLOW".into(),
            direction: "OUTBOUND".into(),
            originator_packets: 12,
            originator_bytes: 3400,
            reply_packets: 10,
            reply_bytes: 1800,
            description: None,
        }
    }

    fn micros(base: DateTime<Utc>, us: i64) -> DateTime<Utc> {
        base + Duration::microseconds(us)
    }

    #[tokio::test]
    async fn test_insert_and_query_roundtrip() {
        let db = temp_db().await;
        let received = micros(Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).unwrap(), 123456);
        let mut event = event_at(received);
        event.description = Some("Allow Outbound Internet via HTTP and HTTPS".into());
        let id = db.insert_event(&event).await.unwrap();
        assert!(id > 0);

        let (records, total) = db
            .query_events(&LogFilter::default(), SortColumn::default(), SortOrder::default(), 100, 0)
            .await
            .unwrap();
        assert_eq!(total, 1);
        assert_eq!(records.len(), 1);
        let record = &records[0];
        assert_eq!(record.received_timestamp, received);
        assert_eq!(record.hostname, "ahv-host-1");
        assert_eq!(record.destination_port, 443);
        assert_eq!(record.originator_bytes, 3400);
        assert_eq!(
            record.description.as_deref(),
            Some("Allow Outbound Internet via HTTP and HTTPS")
        );
    }

    #[tokio::test]
    async fn test_insert_assigns_increasing_ids() {
        let db = temp_db().await;
        let base = Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).unwrap();
        let first = db.insert_event(&event_at(base)).await.unwrap();
        let second = db.insert_event(&event_at(micros(base, 1))).await.unwrap();
        assert!(first > 0);
        assert_eq!(second, first + 1);
    }

    #[tokio::test]
    async fn test_filters_narrow_results() {
        let db = temp_db().await;
        let base = Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).unwrap();
        let mut deny = event_at(micros(base, 1));
        deny.hostname = "nutanix-cluster-1".into();
        deny.action = "DENY".into();
        db.insert_event(&event_at(base)).await.unwrap();
        db.insert_event(&deny).await.unwrap();

        let filter = LogFilter {
            hostname: Some("cluster".into()),
            ..Default::default()
        };
        let (records, total) = db
            .query_events(&filter, SortColumn::default(), SortOrder::default(), 100, 0)
            .await
            .unwrap();
        assert_eq!(total, 1);
        assert_eq!(records[0].hostname, "nutanix-cluster-1");

        let filter = LogFilter {
            action: Some("REJECT".into()),
            ..Default::default()
        };
        let (records, total) = db
            .query_events(&filter, SortColumn::default(), SortOrder::default(), 100, 0)
            .await
            .unwrap();
        assert_eq!(total, 0);
        assert!(records.is_empty());
    }

    #[tokio::test]
    async fn test_sort_and_pagination() {
        let db = temp_db().await;
        let base = Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).unwrap();
        for i in 0..3 {
            db.insert_event(&event_at(micros(base, i))).await.unwrap();
        }

        let (page, total) = db
            .query_events(
                &LogFilter::default(),
                SortColumn::ReceivedTimestamp,
                SortOrder::Asc,
                2,
                0,
            )
            .await
            .unwrap();
        assert_eq!(total, 3);
        assert_eq!(page.len(), 2);
        assert_eq!(page[0].received_timestamp, base);
        assert_eq!(page[1].received_timestamp, micros(base, 1));

        let (rest, _) = db
            .query_events(
                &LogFilter::default(),
                SortColumn::ReceivedTimestamp,
                SortOrder::Asc,
                2,
                2,
            )
            .await
            .unwrap();
        assert_eq!(rest.len(), 1);
        assert_eq!(rest[0].received_timestamp, micros(base, 2));
    }

    #[tokio::test]
    async fn test_sql_metacharacters_round_trip_and_prune() {
        let db = temp_db().await;
        let base = Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).unwrap();
        let mut event = event_at(base);
        event.hostname = "'; DROP TABLE fns_logs; --".into();
        event.description = Some("quote ' and \" and ;".into());
        db.insert_event(&event).await.unwrap();

        let filter = LogFilter {
            hostname: Some("DROP TABLE".into()),
            ..Default::default()
        };
        let (records, total) = db
            .query_events(&filter, SortColumn::default(), SortOrder::default(), 100, 0)
            .await
            .unwrap();
        assert_eq!(total, 1);
        assert_eq!(records[0].hostname, "'; DROP TABLE fns_logs; --");
        assert_eq!(records[0].description.as_deref(), Some("quote ' and \" and ;"));

        // Prunable like any other row, and the table survives.
        let deleted = db.delete_older_than(micros(base, 1)).await.unwrap();
        assert_eq!(deleted, 1);
        db.insert_event(&event_at(base)).await.unwrap();
    }

    #[tokio::test]
    async fn test_cutoff_predicate_is_strictly_less_than() {
        let db = temp_db().await;
        let cutoff = micros(Utc.with_ymd_and_hms(2024, 3, 1, 0, 0, 0).unwrap(), 500000);
        db.insert_event(&event_at(cutoff)).await.unwrap();
        db.insert_event(&event_at(micros(cutoff, -1))).await.unwrap();

        assert_eq!(db.count_older_than(cutoff).await.unwrap(), 1);
        let deleted = db.delete_older_than(cutoff).await.unwrap();
        assert_eq!(deleted, 1);

        let (remaining, _) = db
            .query_events(&LogFilter::default(), SortColumn::default(), SortOrder::default(), 10, 0)
            .await
            .unwrap();
        assert_eq!(remaining.len(), 1);
        assert_eq!(remaining[0].received_timestamp, cutoff);
    }

    #[tokio::test]
    async fn test_filter_options_distinct() {
        let db = temp_db().await;
        let base = Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).unwrap();
        let mut udp = event_at(micros(base, 1));
        udp.protocol = "UDP".into();
        db.insert_event(&event_at(base)).await.unwrap();
        db.insert_event(&udp).await.unwrap();
        db.insert_event(&event_at(micros(base, 2))).await.unwrap();

        let options = db.filter_options().await.unwrap();
        assert_eq!(options.hostnames, vec!["ahv-host-1".to_string()]);
        assert_eq!(options.protocols, vec!["TCP".to_string(), "UDP".to_string()]);
        assert_eq!(options.actions, vec!["ALLOW".to_string()]);
    }

    #[tokio::test]
    async fn test_traffic_summary_groups_destroy_events() {
        let db = temp_db().await;
        let base = Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).unwrap();

        let mut big = event_at(base);
        big.source = "10.0.0.9".into();
        big.originator_bytes = 9000;
        big.reply_bytes = 1000;
        db.insert_event(&big).await.unwrap();
        db.insert_event(&event_at(micros(base, 1))).await.unwrap();

        // Create events carry no completed-flow counters and are excluded.
        let mut create = event_at(micros(base, 2));
        create.event_type = "Create".into();
        create.originator_bytes = 999_999;
        db.insert_event(&create).await.unwrap();

        let buckets = db
            .traffic_summary(GroupBy::Source, None, None, 10)
            .await
            .unwrap();
        assert_eq!(buckets.len(), 2);
        assert_eq!(buckets[0].key, "10.0.0.9");
        assert_eq!(buckets[0].total_bytes, 10000);
        assert_eq!(buckets[0].connection_count, 1);

        let by_port = db
            .traffic_summary(GroupBy::DestinationPort, None, None, 10)
            .await
            .unwrap();
        assert_eq!(by_port[0].key, "443");
    }

    #[tokio::test]
    async fn test_statistics_cover_retention_window() {
        let db = temp_db().await;
        let now = Utc::now();
        db.insert_event(&event_at(now - Duration::minutes(5))).await.unwrap();
        db.insert_event(&event_at(now - Duration::days(2))).await.unwrap();
        // Outside the retention window, ignored by the totals.
        db.insert_event(&event_at(now - Duration::days(40))).await.unwrap();

        let stats = db.statistics(30).await.unwrap();
        assert_eq!(stats.total_records, 2);
        assert_eq!(stats.retention_days, 30);
        assert!(stats.oldest_timestamp.is_some());
        assert!(stats.avg_per_minute > 0.0);
    }

    #[tokio::test]
    async fn test_connect_failure_is_connectivity_error() {
        let dir = TempDir::new().unwrap();
        let missing = dir.path().join("missing").join("test.sqlite3");
        let url = format!("sqlite://{}?mode=ro", missing.display());
        let err = LogDatabase::connect_url(&url).await.unwrap_err();
        assert!(matches!(err, StoreError::ConnectionFailed(_)));
    }
}
