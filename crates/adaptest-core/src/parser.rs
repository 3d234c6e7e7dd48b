//! TOML item-bank parser.
//!
//! Banks are authored as a `[bank]` header plus `[[items]]` entries; every
//! parameter invariant is enforced by [`ItemBank::new`] so malformed banks
//! fail loudly at load time.

use std::path::Path;

use anyhow::{Context, Result};
use serde::Deserialize;

use crate::model::{Item, ItemBank, Model};

/// Intermediate TOML structure for bank files.
#[derive(Debug, Deserialize)]
struct TomlBankFile {
    bank: TomlBankHeader,
    #[serde(default)]
    items: Vec<TomlItem>,
}

#[derive(Debug, Deserialize)]
struct TomlBankHeader {
    id: String,
    #[serde(default)]
    name: String,
    #[serde(default)]
    description: String,
}

#[derive(Debug, Deserialize)]
struct TomlItem {
    id: String,
    model: String,
    #[serde(default)]
    a: Option<f64>,
    #[serde(default)]
    b: Option<f64>,
    #[serde(default)]
    c: Option<f64>,
    #[serde(default)]
    thresholds: Option<Vec<f64>>,
}

/// A parsed bank with its descriptive header.
#[derive(Debug, Clone)]
pub struct BankFile {
    pub id: String,
    pub name: String,
    pub description: String,
    pub bank: ItemBank,
}

/// Parse a TOML file into a validated [`BankFile`].
pub fn load_bank(path: &Path) -> Result<BankFile> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read bank file: {}", path.display()))?;
    parse_bank_str(&content, path)
}

/// Parse a TOML string into a validated [`BankFile`] (useful for testing).
pub fn parse_bank_str(content: &str, source_path: &Path) -> Result<BankFile> {
    let parsed: TomlBankFile = toml::from_str(content)
        .with_context(|| format!("failed to parse TOML: {}", source_path.display()))?;

    let items = parsed
        .items
        .into_iter()
        .map(to_item)
        .collect::<Result<Vec<_>>>()?;

    let bank = ItemBank::new(items)
        .with_context(|| format!("invalid item bank: {}", source_path.display()))?;

    Ok(BankFile {
        id: parsed.bank.id,
        name: parsed.bank.name,
        description: parsed.bank.description,
        bank,
    })
}

fn to_item(raw: TomlItem) -> Result<Item> {
    let id = raw.id;
    let require = |value: Option<f64>, name: &str| {
        value.ok_or_else(|| anyhow::anyhow!("item {id}: missing parameter {name} for {}", raw.model))
    };

    let model = match raw.model.to_uppercase().as_str() {
        "1PL" => Model::OnePl {
            b: require(raw.b, "b")?,
        },
        "2PL" => Model::TwoPl {
            a: require(raw.a, "a")?,
            b: require(raw.b, "b")?,
        },
        "3PL" => Model::ThreePl {
            a: require(raw.a, "a")?,
            b: require(raw.b, "b")?,
            c: require(raw.c, "c")?,
        },
        "GRM" => Model::Graded {
            a: require(raw.a, "a")?,
            thresholds: raw
                .thresholds
                .ok_or_else(|| anyhow::anyhow!("item {id}: missing thresholds for GRM"))?,
        },
        other => anyhow::bail!("item {id}: unknown model: {other}"),
    };

    Ok(Item { id, model })
}
