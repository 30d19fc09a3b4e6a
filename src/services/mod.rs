pub mod exporter;
pub mod page_executor;
pub mod preferences;
pub mod tab_lifecycle;

pub use exporter::IdExporter;
pub use page_executor::PageActionExecutor;
pub use preferences::{PreferenceStore, Preferences};
pub use tab_lifecycle::TabLifecycle;
