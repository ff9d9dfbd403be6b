//! The main Umbra node struct — wires storage, chain, and mempool together.

use std::sync::Arc;

use tokio::task::JoinHandle;

use umbra_chain::{ChainSnapshot, ChainState, GenesisData};
use umbra_mempool::{Mempool, MempoolConfig};
use umbra_store_lmdb::LmdbStore;

use crate::config::NodeConfig;
use crate::error::NodeError;
use crate::shutdown::ShutdownController;

/// A running Umbra node.
///
/// Owns the LMDB environment and the chain/mempool subsystems. The mempool
/// worker runs as a background task; its handle is joined on [`stop`].
///
/// [`stop`]: UmbraNode::stop
pub struct UmbraNode {
    pub config: NodeConfig,
    pub shutdown: Arc<ShutdownController>,
    chain: ChainState<LmdbStore>,
    worker_handle: JoinHandle<()>,
}

impl UmbraNode {
    /// Create and initialize a new Umbra node.
    ///
    /// Opens the LMDB environment at `config.data_dir` (creating the
    /// directory if needed), spawns the mempool worker, and loads the chain
    /// tip — seeding the genesis state on an empty database.
    pub async fn new(config: NodeConfig, genesis: GenesisData) -> Result<Self, NodeError> {
        let store = Arc::new(LmdbStore::open_with_map_size(
            &config.data_dir,
            config.map_size,
        )?);

        let mempool_config = MempoolConfig {
            block_max_size: config.block_max_size,
        };
        let (mempool, worker) = Mempool::new(Arc::clone(&store), mempool_config);
        let worker_handle = tokio::spawn(worker.run());

        let chain = ChainState::init(store, mempool, &genesis)?;

        let tip = chain.snapshot();
        chain.mempool().update_work(tip.hash, tip.height).await?;
        tracing::info!(height = tip.height, hash = %tip.hash, "node initialized");

        Ok(Self {
            config,
            shutdown: Arc::new(ShutdownController::new()),
            chain,
            worker_handle,
        })
    }

    /// The chain subsystem.
    pub fn chain(&self) -> &ChainState<LmdbStore> {
        &self.chain
    }

    /// The mempool facade.
    pub fn mempool(&self) -> &Mempool {
        self.chain.mempool()
    }

    /// The current chain tip.
    pub fn snapshot(&self) -> Arc<ChainSnapshot> {
        self.chain.snapshot()
    }

    /// Run until shutdown is requested, then stop.
    ///
    /// Resolves on SIGINT/SIGTERM or when [`ShutdownController::shutdown`]
    /// is called through a clone of [`Self::shutdown`].
    pub async fn run(self) -> Result<(), NodeError> {
        self.shutdown.wait().await;
        self.stop().await
    }

    /// Shut down the node. Dropping the chain closes the mempool control
    /// channels, which stops the worker; we then wait for it to exit.
    pub async fn stop(self) -> Result<(), NodeError> {
        self.shutdown.shutdown();
        drop(self.chain);
        if let Err(e) = self.worker_handle.await {
            tracing::warn!(error = %e, "mempool worker exited abnormally");
        }
        tracing::info!("node stopped");
        Ok(())
    }
}
