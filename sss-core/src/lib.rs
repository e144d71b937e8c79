//! # sss-core: Server-specific settings pages
//!
//! A server declares one settings page (buttons, sliders, dropdowns, text
//! fields, ...) and every connected client gets its own live copy of it.
//! Client answers are routed back to the right element of the right copy,
//! with change detection deciding when callbacks fire.
//!
//! ## Architecture
//!
//! ```text
//! PageBuilder ──build()──► PageTemplate (immutable, Arc)
//!                               │ instantiate per client
//!                               ▼
//!  Transport ◄── Synchronizer ◄── PageStore ──► ClientPage (per client)
//!      │                            ▲
//!      └── ClientResponse ──► InputRouter ──► listener / handler / InputEvent
//! ```
//!
//! ## Modules
//!
//! - [`id`]: Element id allocation
//! - [`element`]: Element kinds, configs and per-client state
//! - [`builder`]: Fluent page construction and templates
//! - [`page`]: Per-client page copies
//! - [`store`]: Client → page map and lifecycle
//! - [`router`]: Inbound input routing and dispatch
//! - [`sync`]: Outbound serialization and the transport seam
//! - [`protocol`]: Binary wire protocol (bincode-encoded messages)

pub mod builder;
pub mod element;
pub mod id;
pub mod page;
pub mod protocol;
pub mod router;
pub mod store;
pub mod sync;

// Re-exports for convenience
pub use builder::{BuildError, PageBuilder, PageTemplate};
pub use element::{ClientElement, ElementDefinition, ElementKind, InputValue, KindConfig};
pub use id::{ElementId, IdAllocator};
pub use page::{ClientId, ClientPage};
pub use protocol::{ClientMessage, ClientResponse, ProtocolError, ServerMessage};
pub use router::{InputContext, InputEvent, RouteError, RouteOutcome};
pub use store::{PageStore, StoreConfig, StoreStats, Subscription};
pub use sync::{MemoryTransport, Synchronizer, Transport, TransportError};
