//! Store-level request value types. Each one is an immutable description
//! of a single statement (or statement group) against the backing store and
//! knows how to render itself as Postgres SQL; execution belongs to
//! [`crate::store::RecordStore`].

mod aggregate;
mod alter;
mod create;
mod delete;
mod read;
mod upsert;

pub use aggregate::{AggregateTableRequest, PriorityColumns};
pub use alter::AlterTableRequest;
pub use create::{CreateTableRequest, ForeignKey, UniqueIndex};
pub use delete::DeleteTableRequest;
pub use read::ReadTableRequest;
pub use upsert::UpsertTableRequest;
