//! Command implementations for the ReadStore CLI

pub mod hic;
pub mod import;
pub mod quantify;

use readstore_core::{DataChange, DataChangeListener, Genome, Registry, StoreContext};
use std::path::Path;
use std::sync::Arc;

use crate::config::Config;

/// Logs registry changes at debug level
struct LoggingListener;

impl DataChangeListener for LoggingListener {
    fn data_changed(&self, change: &DataChange) {
        log::debug!("Registry change: {:?}", change);
    }
}

pub(crate) fn open_registry(config: &Config, genome: Genome) -> Registry {
    let context = StoreContext::shared(config.store.clone());
    log::debug!(
        "Cache files in {} ({} finalise workers)",
        context.temp_dir().display(),
        context.config().finalize_workers()
    );
    let registry = Registry::new(context, Arc::new(genome));
    registry.add_listener(Arc::new(LoggingListener));
    registry
}

/// Data set name taken from the file stem
pub(crate) fn data_set_name(path: &Path) -> String {
    path.file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_data_set_name() {
        assert_eq!(data_set_name(Path::new("/data/sample_1.tsv")), "sample_1");
        assert_eq!(data_set_name(Path::new("reads")), "reads");
    }
}
