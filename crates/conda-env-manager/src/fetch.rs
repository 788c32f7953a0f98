//! Installer download.

use crate::error::BootstrapError;
use std::fs::File;
use std::path::Path;
use tracing::{debug, info};

/// Fetches the installer artifact to a local file.
pub trait InstallerFetcher {
    fn fetch(&self, url: &str, dest: &Path) -> Result<(), BootstrapError>;
}

/// Plain HTTP(S) download via `reqwest`.
pub struct HttpFetcher {
    client: reqwest::blocking::Client,
}

impl HttpFetcher {
    pub fn new() -> Result<Self, BootstrapError> {
        let client = reqwest::blocking::Client::builder()
            .user_agent(concat!("texasbbq/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(HttpFetcher { client })
    }
}

impl InstallerFetcher for HttpFetcher {
    fn fetch(&self, url: &str, dest: &Path) -> Result<(), BootstrapError> {
        info!("Downloading installer from {}", url);

        let mut response = self.client.get(url).send()?.error_for_status()?;

        // Write next to the destination first so an interrupted download is
        // never mistaken for a cached installer.
        let partial = dest.with_extension("part");
        let mut file = File::create(&partial)?;
        let bytes = response.copy_to(&mut file)?;
        drop(file);
        std::fs::rename(&partial, dest)?;

        debug!(bytes, "Installer saved to {:?}", dest);
        Ok(())
    }
}
