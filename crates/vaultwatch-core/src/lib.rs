//! # vaultwatch-core
//!
//! Event ingestion, correlation, and fusion engine for a monitored security
//! enclosure ("the vault").
//!
//! Sensor readings (ultrasonic distance, PIR motion), media URLs, and ML
//! inference results (face identity, voice identity) arrive as discrete
//! messages over a pub/sub transport. This crate reconstructs a timeline of
//! vault-access episodes from that interleaved stream, attaches late-arriving
//! readings to the correct episode, and derives a single security label per
//! episode via a deterministic priority rule.
//!
//! The transport itself, the inference services, and the UI are external
//! collaborators; the engine only needs a push interface for inbound events
//! ([`gateway::Gateway::deliver`]) and a fire-and-forget publish seam for
//! outbound commands ([`gateway::CommandPublisher`]).

pub mod backfill;
pub mod config;
pub mod engine;
pub mod event;
pub mod export;
pub mod fusion;
pub mod gateway;
pub mod ingest;
pub mod timeline;

pub use config::VaultConfig;
pub use engine::{Engine, Snapshot};
pub use event::{EventKind, InboundEvent};
pub use fusion::{FusionRules, Label};
pub use gateway::{CommandPublisher, DecodeError, Gateway, TopicConfig};
pub use ingest::{IngestQueue, OverflowPolicy};
pub use timeline::{Episode, EpisodeId, Timeline};
