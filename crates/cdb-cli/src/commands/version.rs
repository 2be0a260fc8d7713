//! `cdb version` command

use std::path::Path;

use cdb_graph::TransportFactory;
use cdb_import::{dialect_for, ImportConfig, VersionGuard};

use crate::Result;

pub async fn run(config_path: &Path) -> Result<()> {
    let config = ImportConfig::from_file(config_path)?;

    let factory = TransportFactory::new();
    let transport = factory.connect(&config.connection).await?;
    let guard = VersionGuard::new(dialect_for(&config.connection));

    match guard.get_version(transport.as_ref()).await? {
        Some(version) => println!("{}", version),
        None => println!("no version recorded"),
    }

    transport.close().await?;
    Ok(())
}
