//! # Keeper
//!
//! Session transport engine for coordination-service ensembles.
//!
//! Keeper keeps one logical session alive against an ensemble of servers,
//! moving to another member when the current one fails while preserving the
//! session id, queued requests and reply ordering.
//!
//! ## Crate Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │              keeper (this crate)                            │
//! │   Re-exports all functionality                              │
//! ├─────────────────────────────────────────────────────────────┤
//! │              keeper-transport                               │
//! │  • Connect string + chroot      • DnsResolver               │
//! │  • DynamicHostProvider          • Wire format               │
//! │  • Packet queues                • SocketTransport           │
//! ├─────────────────────────────────────────────────────────────┤
//! │              keeper-core                                    │
//! │  Provider traits: Time, Task, Network, Random, Lookup       │
//! │  Core types: HostAndPort, ResolvedEndPoint                  │
//! │  Sync: VolatileCell, AwaitableSignal                        │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```ignore
//! use keeper::{ConnectString, DynamicHostProvider, HostProviderConfig, TokioProviders};
//!
//! let connect: ConnectString = "zk1:2181,zk2:2181,zk3:2181/app".parse()?;
//! let providers = TokioProviders::new();
//! let mut hosts = DynamicHostProvider::new(
//!     providers.clone(),
//!     connect.hosts().to_vec(),
//!     HostProviderConfig::default(),
//! )?;
//! let endpoint = hosts.next(Duration::from_secs(1)).await?;
//! ```
//!
//! ## Which Crate to Use
//!
//! | Use case | Crate |
//! |----------|-------|
//! | Everything (recommended) | `keeper` |
//! | Provider traits only | `keeper-core` |
//! | Transport without the facade | `keeper-transport` |

#![deny(missing_docs)]

// Re-export all public items from sub-crates
pub use keeper_core::*;
pub use keeper_transport::*;
