//! Sample data generator.
//!
//! Inserts realistic flow-event records spread over the retention period so
//! the viewer and the pruner can be exercised without a live syslog feed.

use chrono::{DateTime, Duration, Utc};
use clap::Parser;
use log::{error, info};
use rand::Rng;
use uuid::Uuid;

use fns_logview::configuration::config::AppConfig;
use fns_logview::log_store::database::LogDatabase;
use fns_logview::log_store::types::NewFlowEvent;

const HOSTNAMES: &[&str] = &[
    "ahv-host-1",
    "ahv-host-2",
    "ahv-host-3",
    "ahv-host-4",
    "nutanix-cluster-1",
];
const OS_TYPES: &[&str] = &["ahv", "esxi", "hyperv"];
const RULE_NAMES: &[&str] = &[
    "Default Global Policy",
    "Web Server Access",
    "Database Access",
    "Internal Network",
    "DMZ Access",
    "Block Malicious IPs",
    "Allow Outbound Internet via HTTP and HTTPS",
    "VPN Access Policy",
];
const EVENT_TYPES: &[&str] = &["Create", "Destroy"];
const PROTOCOLS: &[&str] = &["TCP", "UDP", "ICMP"];
const ACTIONS: &[&str] = &["ALLOW", "DENY", "REJECT"];
const DIRECTIONS: &[&str] = &["INBOUND", "OUTBOUND"];
const COMMON_PORTS: &[u16] = &[80, 443, 22, 23, 25, 53, 3306, 5432, 3389, 8080, 8443];
const DESCRIPTIONS: &[Option<&str>] = &[
    Some("Allow Outbound Internet via HTTP and HTTPS"),
    Some("Block unauthorized access"),
    Some("Internal network communication"),
    Some("Database connection"),
    Some("Web server traffic"),
    None,
];

#[derive(Parser)]
#[command(name = "fns-log-sampledata")]
#[command(version = "0.1.0")]
#[command(about = "Generate sample FNS log entries for testing")]
struct Args {
    /// Spread records over this many days
    #[arg(long, default_value_t = 30)]
    days: i64,

    /// Number of records per day
    #[arg(long, default_value_t = 100)]
    records_per_day: u32,
}

fn pick<'a, T: ?Sized>(rng: &mut impl Rng, pool: &'a [&'a T]) -> &'a T {
    pool[rng.gen_range(0..pool.len())]
}

fn random_ip(rng: &mut impl Rng) -> String {
    format!(
        "{}.{}.{}.{}",
        rng.gen_range(1..224),
        rng.gen_range(0..256),
        rng.gen_range(0..256),
        rng.gen_range(1..255),
    )
}

fn sample_event(rng: &mut impl Rng, received: DateTime<Utc>) -> NewFlowEvent {
    let protocol = pick(rng, PROTOCOLS).to_string();
    let event_type = pick(rng, EVENT_TYPES).to_string();

    let (source_port, destination_port) = if protocol == "ICMP" {
        (0, 0)
    } else {
        let destination = if rng.gen_bool(0.7) {
            COMMON_PORTS[rng.gen_range(0..COMMON_PORTS.len())]
        } else {
            rng.gen_range(1..=65535)
        };
        (rng.gen_range(1024..=65535), destination)
    };

    // Destroy events carry the completed flow's counters, Create events only
    // the handshake traffic.
    let (packets_range, bytes_range) = if event_type == "Destroy" {
        (5..1000u64, 100..1_000_000u64)
    } else {
        (1..10u64, 50..500u64)
    };

    NewFlowEvent {
        received_timestamp: received,
        hostname: pick(rng, HOSTNAMES).to_string(),
        os: pick(rng, OS_TYPES).to_string(),
        event_timestamp: received - Duration::seconds(rng.gen_range(0..5)),
        rule_uuid: Uuid::new_v4().to_string(),
        rule_name: pick(rng, RULE_NAMES).to_string(),
        event_type,
        source: random_ip(rng),
        destination: random_ip(rng),
        protocol,
        source_port,
        destination_port,
        action: pick(rng, ACTIONS).to_string(),
        direction: pick(rng, DIRECTIONS).to_string(),
        originator_packets: rng.gen_range(packets_range.clone()),
        originator_bytes: rng.gen_range(bytes_range.clone()),
        reply_packets: rng.gen_range(packets_range),
        reply_bytes: rng.gen_range(bytes_range),
        description: DESCRIPTIONS[rng.gen_range(0..DESCRIPTIONS.len())].map(String::from),
    }
}

#[tokio::main]
async fn main() {
    env_logger::Builder::from_default_env()
        .filter_level(log::LevelFilter::Info)
        .format_target(false)
        .init();

    let args = Args::parse();

    let config = match AppConfig::from_env() {
        Ok(config) => config,
        Err(e) => {
            error!("Unable to import configuration: {}", e);
            std::process::exit(1);
        }
    };

    let db = match LogDatabase::connect(&config.db).await {
        Ok(db) => db,
        Err(e) => {
            error!("Unable to connect to the log store: {}", e);
            std::process::exit(1);
        }
    };
    if let Err(e) = db.apply_schema().await {
        error!("Unable to create the fns_logs table: {}", e);
        std::process::exit(1);
    }

    let events = {
        let mut rng = rand::thread_rng();
        let now = Utc::now();
        let mut events = Vec::new();
        for day in 0..args.days {
            for _ in 0..args.records_per_day {
                let received = now
                    - Duration::days(day)
                    - Duration::seconds(rng.gen_range(0..86_400))
                    - Duration::microseconds(rng.gen_range(0..1_000_000));
                events.push(sample_event(&mut rng, received));
            }
        }
        events
    };

    info!(
        "Inserting {} sample log entries over {} days",
        events.len(),
        args.days
    );
    for event in &events {
        if let Err(e) = db.insert_event(event).await {
            error!("Insert failed: {}", e);
            std::process::exit(1);
        }
    }
    info!("Done. Inserted {} rows into fns_logs.", events.len());
}
