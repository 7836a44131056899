use anyhow::{Context, Result};
use serde_json::json;
use store_handler::{local_load, ConfigHandler, DatabaseConfig};

fn main() -> Result<()> {
    println!("=== Config round trip ===");

    let handler = ConfigHandler::from_value(json!({
        "engine": "mysql",
        "connector": "pymysql",
        "user": "reader",
        "password": "secret",
        "host": "127.0.0.1",
        "port": 3306,
        "database": "market"
    }));

    let dir = std::env::temp_dir();
    let yaml_path = dir.join("store_handler_demo.yaml");
    let json_path = dir.join("store_handler_demo.json");

    handler.local_dump(&yaml_path).context("Failed to write yaml")?;
    handler.local_dump(&json_path).context("Failed to write json")?;

    let from_yaml = local_load(&yaml_path)?;
    let from_json = local_load(&json_path)?;
    println!("yaml and json agree: {}", from_yaml == from_json);

    let db = DatabaseConfig::from_file(&yaml_path)?;
    println!("dialect: {}", db.dialect()?);
    println!("location: {}", db.location());
    println!("url: {}", db.connection_url()?);

    Ok(())
}
