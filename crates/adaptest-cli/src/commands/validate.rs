//! The `adaptest validate` command.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Result;

use adaptest_core::config::{load_config, CatConfig};
use adaptest_core::model::Model;
use adaptest_core::parser::load_bank;
use adaptest_core::session::CatEngine;

pub fn execute(bank_path: PathBuf, config_path: Option<PathBuf>) -> Result<()> {
    let bank_file = load_bank(&bank_path)?;

    let mut dichotomous = 0usize;
    let mut graded = 0usize;
    for item in bank_file.bank.iter() {
        match item.model {
            Model::Graded { .. } => graded += 1,
            _ => dichotomous += 1,
        }
    }
    println!(
        "Bank: {} ({} items: {dichotomous} dichotomous, {graded} graded)",
        bank_file.id,
        bank_file.bank.len()
    );

    let config = match &config_path {
        Some(path) => {
            let config = load_config(path)?;
            println!(
                "Config: {} estimation, {} selection, {}-{} items, SEM {}",
                config.estimation, config.selection, config.min_items, config.max_items,
                config.min_sem
            );
            config
        }
        None => CatConfig::default(),
    };

    // Cross-validation: fixed items must exist in this bank.
    CatEngine::new(Arc::new(bank_file.bank), config)?;

    println!("All checks passed.");
    Ok(())
}
