//! Shared fixtures for the behaviour tests. Nothing here touches the network.

#![allow(dead_code)]

use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;

use arcdata_core::{AppContext, ArcConfig, ScriptedHttpClient};
use arcdata_warehouse::{Warehouse, WarehouseConfig};

pub const FRED_OBSERVATIONS: &str = "https://api.stlouisfed.org/fred/series/observations";

pub const CPIAUCSL_BODY: &str = r#"{
    "realtime_start": "2024-04-01",
    "observation_start": "1600-01-01",
    "observations": [
        {"date": "2024-01-01", "value": "308.417"},
        {"date": "2024-02-01", "value": "310.326"},
        {"date": "2024-03-01", "value": "."}
    ]
}"#;

pub const MSFT_CHART: &str = r#"{"chart": {"result": [{
    "meta": {"symbol": "MSFT", "currency": "USD", "exchangeName": "NMS", "longName": "Microsoft Corporation", "gmtoffset": -18000},
    "timestamp": [1704205800, 1704292200],
    "indicators": {"quote": [{
        "open": [373.86, 369.01], "high": [375.9, 373.26],
        "low": [366.77, 368.51], "close": [370.87, 370.6],
        "volume": [25258600, 23083500]
    }]}
}], "error": null}}"#;

pub fn config(home: &Path, pairs: &[(&str, &str)]) -> ArcConfig {
    let vars: HashMap<String, String> = pairs
        .iter()
        .map(|(name, value)| ((*name).to_owned(), (*value).to_owned()))
        .collect();
    ArcConfig::from_lookup(|name| vars.get(name).cloned())
        .expect("config")
        .with_home(home)
}

pub fn warehouse_in(home: &Path) -> Warehouse {
    Warehouse::open(WarehouseConfig::under_home(home)).expect("warehouse open")
}

/// Context over a file store under `home` with a FRED key configured.
pub fn context(home: &Path, http: Arc<ScriptedHttpClient>) -> AppContext {
    context_with(home, &[("FRED_API_KEY", "test-key")], http)
}

pub fn context_with(
    home: &Path,
    pairs: &[(&str, &str)],
    http: Arc<ScriptedHttpClient>,
) -> AppContext {
    let config = config(home, pairs);
    let warehouse = Warehouse::open(config.warehouse.clone()).expect("warehouse open");
    AppContext::with_parts(config, warehouse, http)
}
