//! workersql-demo — wires a `CoreState` to a fixed set of in-memory mock
//! shards and runs a handful of requests through it, for local exploration
//! of routing, caching, and invalidation without a real shard fleet.

use std::collections::BTreeMap;
use std::sync::Arc;

use log::info;

use workersql_core::config::Config;
use workersql_core::policy::Policy;
use workersql_core::shard::mock::MockShard;
use workersql_core::shard::AdminProtocol;
use workersql_core::CoreState;

fn parse_shard_count(args: &[String]) -> u32 {
    let mut i = 1;
    while i < args.len() {
        if (args[i] == "--shards" || args[i] == "-s") && i + 1 < args.len() {
            if let Ok(n) = args[i + 1].parse() {
                return n;
            }
        }
        i += 1;
    }
    4
}

fn print_help() {
    println!("workersql-demo - local exploration harness for the WorkerSQL core");
    println!();
    println!("Usage: workersql-demo [OPTIONS]");
    println!();
    println!("Options:");
    println!("  -s, --shards N   Number of in-memory mock shards to register (default: 4)");
    println!("  -h, --help       Show this help");
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args: Vec<String> = std::env::args().collect();
    if args.iter().any(|a| a == "--help" || a == "-h") {
        print_help();
        return Ok(());
    }
    let shard_count = parse_shard_count(&args);

    info!("starting workersql-demo with {} mock shards", shard_count);

    let mut config = Config::default();
    config.shard_count = shard_count;

    let mut tenants = BTreeMap::new();
    tenants.insert("tenant-a".to_string(), "shard_0".to_string());
    let policy = Policy::new(1, 0, tenants, vec![]);

    let state = Arc::new(CoreState::new(config, policy));
    for i in 0..shard_count {
        state.coordinator.register_shard(
            format!("shard_{}", i),
            Arc::new(MockShard::new()) as Arc<dyn AdminProtocol>,
        );
    }

    state
        .ddl("tenant-a", "CREATE TABLE users (id INT, name TEXT)", 0)
        .await?;
    state
        .mutation("tenant-a", "INSERT INTO users VALUES (1, 'ada')", &[], None, 0)
        .await?;
    let outcome = state.select("tenant-a", "SELECT * FROM users", &[], 0).await?;
    info!("select users -> shard {} (cached={}): {}", outcome.shard_id, outcome.cached, outcome.data);

    let repeat = state.select("tenant-a", "SELECT * FROM users", &[], 1).await?;
    info!("repeat select -> cached={}", repeat.cached);

    state.shutdown().await;
    Ok(())
}
