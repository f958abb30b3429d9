// Services module

pub mod categories;
pub mod expenses;
pub mod extraction;
pub mod firestore;
pub mod firestore_codec;
#[cfg(test)]
pub mod mocks;
pub mod store;

pub use categories::CategoryService;
pub use expenses::ExpenseService;
pub use extraction::{ExtractionService, SavedExtraction};
pub use firestore::FirestoreService;
pub use store::DocumentStore;
