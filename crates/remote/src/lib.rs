//! The conversation-provider client (§4.5) and the cloud sync worker (§4.6).

pub mod client;
pub mod cloud;
pub mod sync_worker;

pub use client::{ConversationProviderClient, SyncMode};
pub use cloud::{DocumentServiceClient, MemoryServiceClient};
pub use sync_worker::{format_markdown_transcript, SyncWorker};
