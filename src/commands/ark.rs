//! `ark`: parse an identifier and show its components.

use anyhow::Result;
use gallica_core::parser::Ark;
use serde_json::json;

use super::parse_ark_arg;

pub fn run_ark_command(input: &str, as_json: bool) -> Result<()> {
    let ark = parse_ark_arg(input)?;
    if as_json {
        println!("{}", serde_json::to_string_pretty(&describe(&ark))?);
        return Ok(());
    }

    println!("canonical = {ark}");
    println!("root = {}", ark.root());
    if let Some(scheme) = ark.scheme() {
        println!("scheme = {scheme}");
    }
    if let Some(authority) = ark.authority() {
        println!("authority = {authority}");
    }
    if let Some(naan) = ark.naan() {
        println!("naan = {naan}");
    }
    println!("name = {}", ark.name());
    println!("qualifiers = {}", ark.qualifiers().join("/"));
    Ok(())
}

fn describe(ark: &Ark) -> serde_json::Value {
    json!({
        "canonical": ark.to_string(),
        "root": ark.root().to_string(),
        "parts": ark,
    })
}
