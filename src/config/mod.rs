//! Config module.
//! Provides configuration types, default paths, XML loading, and validation.

pub mod paths;
pub mod types;
mod validate;
pub mod xml;

pub use paths::{
    CONFIG_ENV, default_config_path, default_log_path, default_store_path,
    path_has_symlink_ancestor,
};
pub use types::{Config, LogLevel};
pub use xml::{LoadResult, create_template_config, load_config_from_xml_path, load_or_init};

/// Root of the local disk when neither XML nor CLI name one.
pub const DISK_ROOT_DEFAULT: &str = "/srv/resilient_move";
pub const BREAKER_NAME_DEFAULT: &str = "storage";
pub const SENDMAIL_DEFAULT: &str = "/usr/sbin/sendmail";
