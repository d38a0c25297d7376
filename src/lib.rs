pub mod chain;
pub mod common;
pub mod config;
pub mod crypto;
pub mod error;
pub mod merkle;
pub mod pdp;
pub mod storage;
pub mod task;
pub mod utils;

use std::sync::Arc;

use chain::ChainClient;
use config::MinerConfig;
use crypto::keys::KeyMaterial;
use crypto::Scheme;
use error::ConfigError;
use storage::manager::StorageManager;
use task::challenge::ChallengeResponseTask;
use task::clear::InvalidFileCleaner;
use task::Supervisor;

/// Wire the proving subsystem and return the supervisor that drives it.
/// The hosting command provides the chain collaborator and calls
/// `Supervisor::run`; missing key material is the one fatal startup
/// condition.
pub fn build_supervisor(
    config: &MinerConfig,
    chain: Arc<dyn ChainClient>,
) -> Result<Supervisor, ConfigError> {
    utils::init_logging();
    let keys = KeyMaterial::load(&config.key_file)?;
    if keys.kind() != config.scheme {
        return Err(ConfigError::SchemeMismatch(format!(
            "key file holds {:?}, config wants {:?}",
            keys.kind(),
            config.scheme
        )));
    }
    let scheme: Arc<Scheme> = Arc::new(
        keys.scheme()
            .map_err(|e| ConfigError::SchemeMismatch(e.to_string()))?,
    );
    let store = Arc::new(StorageManager::new(&config.base_dir)?);

    let prover = Arc::new(ChallengeResponseTask::new(
        Arc::clone(&chain),
        Arc::clone(&store),
        scheme,
        config.miner_account_bytes(),
        config.task.clone(),
    ));
    let cleaner = Arc::new(InvalidFileCleaner::new(chain, store, config.task.clone()));

    let mut supervisor = Supervisor::new();
    let p = Arc::clone(&prover);
    supervisor.register("challenge-response", Arc::new(move |stop| p.run(stop)));
    let c = Arc::clone(&cleaner);
    supervisor.register("invalid-file-cleaner", Arc::new(move |stop| c.run(stop)));
    Ok(supervisor)
}
