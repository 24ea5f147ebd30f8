//! bitwarden-sync - manage Bitwarden secure notes through the `bw` CLI.
//!
//! The crate drives the official Bitwarden CLI in one of two ways:
//!
//! - **Subcommand**: one `bw` process per operation, with the session token
//!   passed on every call.
//! - **Serve**: a single `bw serve` child on a loopback port, driven over HTTP
//!   and killed when the client closes.
//!
//! Both sit behind the [`Transport`] trait. [`VaultClient`] composes them with
//! the payload codec and works around the CLI's known quirks: a forced `sync`
//! before every read and write, duplicated collection ids, and rate limiting.
//!
//! # Quick Start
//!
//! ```no_run
//! use bitwarden_sync::{Config, SecureNote, TransportKind, VaultClient};
//!
//! #[tokio::main]
//! async fn main() -> bitwarden_sync::Result<()> {
//!     let config = Config::new("master password")
//!         .with_transport(TransportKind::Serve { port: None });
//!
//!     let mut client = VaultClient::connect(config).await?;
//!
//!     let note = SecureNote::new(
//!         "0b7f3f4e-8c53-4f66-9c54-0d6c1f2a9b11",
//!         "deploy-notes",
//!         "rotate keys on friday",
//!     )
//!     .with_collections(["4c1d2e3f-0a1b-4c2d-8e3f-405162738495"]);
//!
//!     let item = client.create(&note).await?;
//!     println!("created {}", item.id);
//!
//!     client.close().await
//! }
//! ```
//!
//! # Feature Flags
//!
//! | Feature | Default | Provides |
//! |---------|---------|----------|
//! | `mock` | yes | [`transports::MockTransport`], an in-memory `bw` for tests |

pub mod cli;
pub mod client;
pub mod codec;
pub mod config;
pub mod error;
pub mod item;
pub mod resource;
pub mod session;
pub mod transport;
pub mod transports;
pub mod validation;
pub mod version;

pub use client::VaultClient;
pub use config::{Config, ProviderConfig, TransportKind};
pub use error::{BitwardenError, Result};
pub use item::{Collection, Item, ItemCreate, ItemType, SecureNote};
pub use resource::{SecureNoteResource, SecureNoteState};
pub use session::Session;
pub use transport::Transport;
