pub mod assembler;
pub mod chunking;
pub mod cli;
pub mod config;
pub mod form;
pub mod images;
pub mod logo;
pub mod mailer;
pub mod plan;
pub mod sheets;
pub mod site;
pub mod store;
pub mod stripe;
pub mod web;

pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

pub use assembler::{assemble, assemble_now};
pub use config::Settings;
pub use plan::{locked_fields, Plan};
pub use site::SiteData;
pub use web::{router, AppState};
