//! The `adaptest init` command.

use anyhow::Result;

pub fn execute() -> Result<()> {
    // Create adaptest.toml
    if std::path::Path::new("adaptest.toml").exists() {
        println!("adaptest.toml already exists, skipping.");
    } else {
        std::fs::write("adaptest.toml", SAMPLE_CONFIG)?;
        println!("Created adaptest.toml");
    }

    // Create example item bank
    std::fs::create_dir_all("banks")?;
    let example_path = std::path::Path::new("banks/example.toml");
    if example_path.exists() {
        println!("banks/example.toml already exists, skipping.");
    } else {
        std::fs::write(example_path, EXAMPLE_BANK)?;
        println!("Created banks/example.toml");
    }

    println!("\nNext steps:");
    println!("  1. Edit adaptest.toml with your stopping rules");
    println!("  2. Run: adaptest validate --bank banks/example.toml --config adaptest.toml");
    println!("  3. Run: adaptest simulate --bank banks/example.toml --config adaptest.toml");

    Ok(())
}

const SAMPLE_CONFIG: &str = r#"# adaptest configuration

# Ability estimation: "eap" or "mle" (mle falls back to eap when undefined)
estimation = "eap"

# Item selection: "mi", "mfi", or "kl"
selection = "mi"

min_items = 5
max_items = 20
min_sem = 0.3

prior_mean = 0.0
prior_sd = 1.0

# Items administered first regardless of the criterion, e.g.:
# fixed_items = ["warmup-1"]

parallel_workers = 4
"#;

const EXAMPLE_BANK: &str = r#"[bank]
id = "example"
name = "Example mixed bank"
description = "A small mixed-model bank to get started"

[[items]]
id = "easy-1"
model = "2PL"
a = 0.9
b = -1.5

[[items]]
id = "easy-2"
model = "1PL"
b = -0.8

[[items]]
id = "medium-1"
model = "2PL"
a = 1.2
b = 0.0

[[items]]
id = "medium-2"
model = "3PL"
a = 1.1
b = 0.2
c = 0.2

[[items]]
id = "hard-1"
model = "2PL"
a = 1.4
b = 1.0

[[items]]
id = "hard-2"
model = "2PL"
a = 1.0
b = 1.8

[[items]]
id = "survey-1"
model = "GRM"
a = 1.3
thresholds = [-2.0, -0.5, 0.5, 2.0]

[[items]]
id = "survey-2"
model = "GRM"
a = 1.0
thresholds = [-1.0, 0.0, 1.0]
"#;
