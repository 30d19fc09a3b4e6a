pub mod sheet_client;

pub use sheet_client::{SheetApi, SheetClient};
