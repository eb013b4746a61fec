//! # wrq
//!
//! Compiles declarative Wrq XML requests into parameterized SQL for several
//! dialects and streams the results back as Wrs XML.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────┐
//! │                 Wrq request document                     │
//! └─────────────────────────────────────────────────────────┘
//!                          │
//!                          ▼ [request]
//! ┌─────────────────────────────────────────────────────────┐
//! │        Request model (selects, CTEs, filters)            │
//! └─────────────────────────────────────────────────────────┘
//!                          │
//!                          ▼ [compiler] + [binding] + [security]
//! ┌─────────────────────────────────────────────────────────┐
//! │     Query AST → Statement (SQL text + bound variables)   │
//! └─────────────────────────────────────────────────────────┘
//!                          │
//!                          ▼ [execution]
//! ┌─────────────────────────────────────────────────────────┐
//! │                 Result set → [writer] → Wrs              │
//! └─────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Example
//!
//! ```no_run
//! use wrq::prelude::*;
//!
//! let catalog = Catalog::from_file("catalog.toml")?;
//! let request = parse_request(&std::fs::read_to_string("report.xml")?)?;
//! let security = SecuritySettings::default();
//! let subject = StaticSubject::new("alice").with_values("region", &["EU"]);
//!
//! let compiled = QueryBuilder::new(&catalog, Dialect::Postgres, &security, &subject)
//!     .compile(&request)?;
//! println!("{}", compiled.statement.sql());
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

pub mod binding;
pub mod compiler;
pub mod config;
pub mod execution;
pub mod request;
pub mod security;
pub mod sql;
pub mod writer;

/// The types most callers need.
pub mod prelude {
    pub use crate::binding::{BindingItem, Catalog, CatalogRegistry, CatalogTable};
    pub use crate::compiler::{CompileError, CompiledQuery, QueryBuilder};
    pub use crate::config::{SecuritySettings, Settings};
    pub use crate::execution::{
        ConnectionManager, DataLoader, RequestOptions, SqliteConnectionManager,
    };
    pub use crate::request::{parse_request, WrqRequest};
    pub use crate::security::{StaticSubject, Subject};
    pub use crate::sql::{Dialect, JdbcType, Statement};
    pub use crate::writer::{ResultWriter, WriterOptions, WrsWriter};
}
