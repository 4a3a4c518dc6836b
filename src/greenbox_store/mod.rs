mod schema;
mod sqlite_greenbox_store;

pub use schema::GREENBOX_VERSIONED_SCHEMAS;
pub use sqlite_greenbox_store::SqliteGreenboxStore;
