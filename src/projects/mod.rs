pub mod store;
pub mod sqlite_store;

pub use store::{
    ProjectStore,
    Project,
    ProjectCount,
    NewProject,
};
pub use sqlite_store::SqliteProjectStore;
