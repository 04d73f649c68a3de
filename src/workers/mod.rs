pub mod requery;
pub mod webhook_retry;
