use std::{
    fs,
    io::{self, Read},
};

use anyhow::{Result, anyhow};
use clap::ArgMatches;
use serde_json::Value;
use tracing::debug;

use crate::policies;

fn read_request(path: &str) -> Result<Vec<u8>> {
    if path == "-" {
        let mut buffer = Vec::new();
        io::stdin()
            .read_to_end(&mut buffer)
            .map_err(|e| anyhow!("cannot read request from stdin: {}", e))?;
        return Ok(buffer);
    }
    fs::read(path).map_err(|e| anyhow!("cannot read request file {}: {}", path, e))
}

/// Settings files can be YAML or JSON, an empty file means no settings
fn read_settings_file(path: &str) -> Result<Value> {
    let contents = fs::read_to_string(path)
        .map_err(|e| anyhow!("cannot read settings file {}: {}", path, e))?;
    if contents.trim().is_empty() {
        return Ok(Value::Null);
    }
    serde_yaml::from_str(&contents)
        .map_err(|e| anyhow!("cannot parse settings file {}: {}", path, e))
}

fn read_settings(matches: &ArgMatches) -> Result<Value> {
    if let Some(path) = matches.get_one::<String>("settings-path") {
        return read_settings_file(path);
    }
    match matches.get_one::<String>("settings-json") {
        Some(json) => {
            serde_json::from_str(json).map_err(|e| anyhow!("cannot parse settings JSON: {}", e))
        }
        None => Ok(Value::Null),
    }
}

pub(crate) fn exec(matches: &ArgMatches) -> Result<()> {
    let policy = matches
        .get_one::<String>("policy")
        .ok_or_else(|| anyhow!("missing policy name"))?;
    let request_path = matches
        .get_one::<String>("request-path")
        .ok_or_else(|| anyhow!("missing request path"))?;

    let settings = read_settings(matches)?;
    let request = read_request(request_path)?;
    debug!(policy = policy.as_str(), request = request_path.as_str(), "evaluating");

    let response = policies::evaluate(policy, settings, &request)?;
    println!("{}", String::from_utf8(response)?);

    Ok(())
}
