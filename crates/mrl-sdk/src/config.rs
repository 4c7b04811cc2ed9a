use mrl_notify::{HubConfig, SyncMode, WalConfig, WalRetention};

/// Configuration for a [`crate::Ledger`].
#[derive(Clone, Debug)]
pub struct LedgerConfig {
    /// Node identifier for event stamping.
    pub node_id: u16,
    /// Capacity of per-subscriber broadcast channels.
    pub channel_capacity: usize,
    /// Sync/flush strategy for the journal.
    pub sync_mode: SyncMode,
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self {
            node_id: 0,
            channel_capacity: 1024,
            sync_mode: SyncMode::default(),
        }
    }
}

impl LedgerConfig {
    /// Durable variant: fsync the journal on every committed mutation.
    pub fn durable() -> Self {
        Self {
            sync_mode: SyncMode::EveryWrite,
            ..Self::default()
        }
    }

    pub(crate) fn hub_config(&self) -> HubConfig {
        HubConfig {
            node_id: self.node_id,
            channel_capacity: self.channel_capacity,
            wal: WalConfig {
                sync_mode: self.sync_mode.clone(),
                // The journal doubles as the ledger's persistence: registry
                // state is rebuilt from it on open, so checkpoint-deletion
                // retention is never used here.
                retention: WalRetention::KeepAll,
            },
        }
    }
}
