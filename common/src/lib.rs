pub mod cancel_token;
pub mod file_format;
pub mod float_ext;
pub mod log_setup;

pub use cancel_token::CancelToken;
pub use file_format::{load_config, parse_config, ConfigFileError, ConfigFormat};
pub use float_ext::FloatExt;
pub use log_setup::setup_logging;

pub const EPSILON: f64 = 1e-9;
