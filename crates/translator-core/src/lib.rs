//! Translator Core - Display-value translation engine
//!
//! Types declare which of their fields hold display text and which fields
//! carry the codes it is looked up by. After an operation returns, the
//! [`Translator`] walks the result and fills those fields in place, resolving
//! each code through a call-scoped cache, a shared cache and finally a lookup
//! source.
//!
//! ```ignore
//! impl Record for Order {
//!     fn declare(decl: &mut Declaration<Self>) {
//!         decl.read("status_code", |o| o.status_code.clone())
//!             .write("status_name", |o, v| o.status_name = Some(v))
//!             .translate(
//!                 "status_name",
//!                 FieldSpec::associated(["status_code"]).dict_code("ORDER_STATUS"),
//!             );
//!     }
//! }
//!
//! let translator = Translator::from_config(&config, Arc::new(SqliteLookup::new("dict.db")));
//! translator.run(&mut orders);
//! ```

pub mod cache;
pub mod declare;
pub mod engine;
pub mod error;
pub mod field;
pub mod graph;
pub mod lookup;
pub mod param;
pub mod query;
pub mod registry;
#[cfg(feature = "sqlite")]
pub mod sqlite;

pub use cache::{CacheChain, CallCache, Cached, ChainStats, LocalCache, Locality, SharedCache};
pub use declare::{Declaration, Descriptor, Record};
pub use engine::{Translator, TranslatorBuilder};
pub use error::{AccessError, DeclarationError};
pub use field::FieldTranslator;
pub use graph::{Enrich, Node};
pub use lookup::{LookupConnection, LookupSource, MemoryLookup};
pub use param::{IntoParam, Param};
pub use query::{CompiledQuery, DictTemplates, FieldSpec};
pub use registry::{Registry, TypeMetadata};
#[cfg(feature = "sqlite")]
pub use sqlite::SqliteLookup;
