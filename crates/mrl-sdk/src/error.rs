use thiserror::Error;

#[derive(Debug, Error)]
pub enum LedgerError {
    #[error("registry error: {0}")]
    Registry(#[from] mrl_registry::RegistryError),

    #[error("notification error: {0}")]
    Notify(#[from] mrl_notify::NotifyError),
}

pub type LedgerResult<T> = Result<T, LedgerError>;
