//! Infrastructure layer for configuration, logging, page fetching, HTML
//! parsing and spreadsheet I/O

pub mod config; // Configuration loading and field selection persistence
pub mod http_client; // Browser-like sessions with retry
pub mod logging; // Logging infrastructure
pub mod parsing; // Product page extraction
pub mod spreadsheet; // Input sheets and incremental XLSX output

// Re-export commonly used items
pub use config::{AppConfig, ConfigError, ConfigLoader, FieldSelectionStore};
pub use http_client::{
    DocumentFetcher, DocumentSource, FetchError, FetchOutcome, FetchedPage, FetcherConfig,
    HttpSessionFactory, SessionFactory,
};
pub use logging::{cleanup_old_logs, get_log_directory, init_logging};
pub use parsing::{ParsingError, ParsingResult, ProductPageExtractor};
pub use spreadsheet::{
    InputSheet, OutputRow, OutputTable, SpreadsheetError, TableWriter, XlsxTableWriter, load_input,
    output_path_for,
};
