//! Query server for the swarm arena world model.
//!
//! Clients open a WebSocket (any path) and exchange JSON objects: each
//! request selects queries by field name and gets at most one reply, built
//! from the snapshot current when the request arrived. See [`protocol`] for
//! the message shapes.
//!
//! ```no_run
//! use swarm_arena_core::{world_store, ServerConfig, WorldModel};
//!
//! # async fn run() -> Result<(), swarm_arena_server::ServerError> {
//! let (_publisher, store) = world_store(WorldModel::default());
//! let listener = swarm_arena_server::bind(&ServerConfig::default()).await?;
//! swarm_arena_server::serve(listener, store, std::future::pending()).await?;
//! # Ok(())
//! # }
//! ```

pub mod protocol;
mod server;

pub use protocol::{answer, respond, ProtocolDecodeError, QueryError, Request};
pub use server::{bind, router, serve, ServerError};
