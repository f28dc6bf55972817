use sprout::engine::config::GrowConfig;
use std::path::PathBuf;
use std::time::Duration;

pub struct AppConfig {
    pub template_path: PathBuf,
    pub receptor_path: Option<PathBuf>,
    pub output_dir: PathBuf,
    pub attachments: Vec<usize>,
    /// Empty selects the whole library.
    pub fragments: Vec<String>,
    pub fragment_library: Option<PathBuf>,
    pub timeout: Option<Duration>,
    pub core_config: GrowConfig,
}
