// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Ankit Kumar Pandey

//! `fnsync list` command - List functions deployed on the platform.

use std::sync::Arc;

use fnsync_core::transport::DEFAULT_REQUEST_TIMEOUT;
use fnsync_core::{ConfigLoader, FunctionDirectory, HttpTransport, PlatformAddress};

pub async fn execute(
    config_path: &str,
    address: Option<&str>,
) -> Result<(), Box<dyn std::error::Error>> {
    let (addresses, request_timeout) = match address {
        Some(address) => (vec![PlatformAddress::new(address)?], DEFAULT_REQUEST_TIMEOUT),
        None => {
            let config = ConfigLoader::load_file(config_path)?;
            (config.addresses(), config.platform.request_timeout)
        }
    };

    let transport = Arc::new(HttpTransport::new(request_timeout)?);
    let directory = FunctionDirectory::new(transport);

    for address in &addresses {
        let entries = directory.list(address).await?;

        println!("Platform {}", address);
        if entries.is_empty() {
            println!("  No functions deployed.");
            println!();
            continue;
        }

        println!("╔══════════════════════╦═════════╦══════════════════╦══════════════════════╗");
        println!("║ Name                 ║ Threads ║ Hash             ║ Resource             ║");
        println!("╠══════════════════════╬═════════╬══════════════════╬══════════════════════╣");

        for entry in &entries {
            let short_hash: String = entry.hash.chars().take(16).collect();
            println!(
                "║ {:<20} ║ {:<7} ║ {:<16} ║ {:<20} ║",
                entry.name, entry.threads, short_hash, entry.resource
            );
        }

        println!("╚══════════════════════╩═════════╩══════════════════╩══════════════════════╝");
        println!("Total: {} function(s)", entries.len());
        println!();
    }

    Ok(())
}
