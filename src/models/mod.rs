// Models module

pub mod category;
pub mod expense;
pub mod settings;

pub use category::{
    CategoryCreate, CategoryDB, CategoryUpdate, Subcategory, SubcategoryCreate, SubcategoryUpdate,
};
pub use expense::{
    ExpenseDB, ExpenseFilter, ExpenseUpdate, ExtractionLog, ExtractionResult, NewExpense,
    UpdateExpenseRequest,
};
pub use settings::{AiSettings, ProviderModels, ProviderName, UpdateSettingsRequest};
