use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::{debug, info};

use crate::config::GatewayConfig;
use crate::schema_registry::{InMemorySchemaRegistry, SchemaRegistry};
use crate::Result;

/// Reads and writes the registry file.
///
/// Export and import run outside the registry lock, so callers must not
/// mutate the registry from elsewhere while a save is in flight.
#[derive(Debug, Clone)]
pub struct RegistryManager {
    registry_path: PathBuf,
}

impl RegistryManager {
    pub fn new(config: &GatewayConfig) -> Self {
        Self::at(&config.registry_file)
    }

    pub fn at(path: impl AsRef<Path>) -> Self {
        RegistryManager {
            registry_path: path.as_ref().to_path_buf(),
        }
    }

    pub fn registry_path(&self) -> &Path {
        &self.registry_path
    }

    /// Loads the registry file; a missing file yields an empty registry.
    pub async fn load(&self) -> Result<InMemorySchemaRegistry> {
        let registry = InMemorySchemaRegistry::new();
        self.load_into(&registry).await?;
        Ok(registry)
    }

    pub async fn load_into(&self, registry: &dyn SchemaRegistry) -> Result<()> {
        match read_bytes(&self.registry_path).await? {
            Some(data) => registry.import_registry(&data).await,
            None => {
                debug!(path = %self.registry_path.display(), "no registry file, starting empty");
                Ok(())
            }
        }
    }

    pub async fn save(&self, registry: &dyn SchemaRegistry) -> Result<()> {
        let data = registry.export_registry().await?;
        write_bytes(&self.registry_path, &data).await?;
        info!(path = %self.registry_path.display(), "registry saved");
        Ok(())
    }
}

pub async fn read_bytes(path: &Path) -> Result<Option<Vec<u8>>> {
    match fs::read(path).await {
        Ok(data) => Ok(Some(data)),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
        Err(e) => Err(e.into()),
    }
}

// Written to a sibling file first so readers never observe a partial registry.
pub async fn write_bytes(path: &Path, data: &[u8]) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).await?;
    }
    let mut tmp = path.as_os_str().to_owned();
    tmp.push(".tmp");
    fs::write(&tmp, data).await?;
    fs::rename(&tmp, path).await?;
    Ok(())
}
