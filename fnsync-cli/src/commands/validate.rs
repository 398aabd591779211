// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Ankit Kumar Pandey

//! `fnsync validate` command - Validate the manifest and derive identities.

use fnsync_core::{identity, ConfigLoader};

pub async fn execute(file: &str) -> Result<(), Box<dyn std::error::Error>> {
    tracing::info!(file = %file, "Validating manifest");

    let config = match ConfigLoader::load_file(file) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("✗ Manifest validation failed:");
            eprintln!("  {}", e);
            std::process::exit(1);
        }
    };

    println!("✓ Manifest is valid");
    println!();
    println!("Platform Settings:");
    match &config.platform.address {
        Some(address) => println!("  Address:         {}", address),
        None => println!("  Address:         (per function)"),
    }
    println!(
        "  Request Timeout: {}ms",
        config.platform.request_timeout.as_millis()
    );
    println!();

    let mut unreadable = 0usize;
    println!("Functions ({}):", config.functions.len());
    for func in &config.functions {
        match identity::derive_from_desired(&func.desired) {
            Ok(id) => println!("  - {} → {}", func.key, id),
            Err(e) => {
                unreadable += 1;
                println!("  - {} ✗ {}", func.key, e);
            }
        }
    }

    if unreadable > 0 {
        eprintln!();
        eprintln!("✗ {} artifact(s) could not be read", unreadable);
        std::process::exit(1);
    }

    Ok(())
}
