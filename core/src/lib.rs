pub mod error;
pub mod filesystem;
pub mod install;
pub mod source;

pub use error::DuetiError;
pub use filesystem::FilesystemKind;
pub use install::{InstallOptions, InstallReport, InstallTarget};
pub use source::{BootFileResolver, BootFiles};
