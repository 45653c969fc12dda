pub mod builders;

pub use builders::{MockBackend, StoreBuilder};
