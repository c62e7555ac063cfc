//! Init command implementation.

use anyhow::{Context, Result};
use std::fs;
use std::path::Path;
use tracing::info;

const ENDPOINT: &str = r"hub_endpoint{path,methods,backend_url,timeout_ms,retries,policies}:
  /v1/orders
  GET|POST
  https://orders.internal
  30000
  3
  policies[3]{id,name,type,enabled,priority,mode,conditions,channels,config}:
    api-key,API key,authentication,true,1,all,,,scheme=api_key;header=X-Api-Key
    per-key-limit,Per-key limit,rateLimit,true,1,all,,,requests=100;window_seconds=60
    slow-responses,Slow responses,monitoring,true,1,all,response_time greater_than 5000 for 5m,email|sms,severity=high
";

const SAMPLES: &str = "timestamp,endpoint,metric,value
2024-01-15T09:00:00Z,/v1/orders,response_time,6200
2024-01-15T09:01:00Z,/v1/orders,response_time,6400
2024-01-15T09:02:00Z,/v1/orders,response_time,7100
2024-01-15T09:03:00Z,/v1/orders,response_time,6900
2024-01-15T09:04:00Z,/v1/orders,response_time,6600
2024-01-15T09:05:00Z,/v1/orders,response_time,6300
2024-01-15T09:06:00Z,/v1/orders,response_time,240
";

const CONFIG: &str = "policy_paths:
  - endpoint.toon
channel_capacity: 256
stale_policy: skip
dispatcher: log
";

const GITIGNORE: &str = "# TSmart Hub generated files
hub-export.yaml
endpoint.lock
policy-report.md
endpoint-docs.md
events.jsonl
";

/// Runs the init command.
pub fn run(path: &str) -> Result<()> {
    let project_path = Path::new(path);
    info!("Initializing hub project at: {}", project_path.display());

    fs::create_dir_all(project_path)
        .with_context(|| format!("Failed to create directory: {}", project_path.display()))?;

    for (name, content) in [
        ("endpoint.toon", ENDPOINT),
        ("samples.csv", SAMPLES),
        ("hub.yaml", CONFIG),
        (".gitignore", GITIGNORE),
    ] {
        let file = project_path.join(name);
        if file.exists() {
            info!("Skipped: {} (already exists)", file.display());
            continue;
        }
        fs::write(&file, content).with_context(|| format!("Failed to create {name}"))?;
        info!("Created: {}", file.display());
    }

    info!("Hub project initialized successfully!");
    info!("");
    info!("Next steps:");
    info!("  1. Edit endpoint.toon to define your policies");
    info!("  2. Run 'hub validate' to check them");
    info!("  3. Run 'hub evaluate' to replay samples.csv");
    info!("  4. Run 'hub monitor -s samples.csv' to watch a stream");

    Ok(())
}
