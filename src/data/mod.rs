//! Customer data: schema, records and dataset loading

mod loader;
mod schema;

pub use loader::{DataLoader, Dataset};
pub use schema::{
    ColumnKind, ColumnSpec, CustomerRecord, FeatureSchema, FeatureValue, FieldError, OwnedValue,
    ID_COLUMN, LABEL_COLUMN,
};
