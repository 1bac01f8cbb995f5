//! Configuration of a task's transport endpoint.

use std::sync::Arc;

use crate::markers::MARKER_LEN;
use crate::pool::ViewPool;

/// Memory-budget configuration for one task's view pool.
#[derive(Clone, Debug)]
pub struct Config {
    /// Number of pooled views; the task's outstanding-buffer budget.
    pub views: usize,
    /// Bytes per view, including any reserved prefix.
    pub view_bytes: usize,
    /// Reserved leading bytes per view, for a transport header.
    pub reserve: usize,
}

impl Default for Config {
    fn default() -> Config {
        Config {
            views: 64,
            view_bytes: 1 << 16,
            reserve: 0,
        }
    }
}

impl Config {

    /// Constructs a new configuration by parsing supplied text arguments.
    ///
    /// Most commonly, this uses `std::env::args()` as the supplied iterator.
    #[cfg(feature = "getopts")]
    pub fn from_args<I: Iterator<Item = String>>(args: I) -> Result<Config, String> {

        let mut opts = getopts::Options::new();
        opts.optopt("n", "views", "number of pooled views", "NUM");
        opts.optopt("b", "view-bytes", "bytes per view", "NUM");
        opts.optopt("r", "reserve", "reserved leading bytes per view", "NUM");

        let matches = opts.parse(args).map_err(|e| e.to_string())?;

        let defaults = Config::default();
        let views = matches.opt_get_default("n", defaults.views).map_err(|e| e.to_string())?;
        let view_bytes = matches.opt_get_default("b", defaults.view_bytes).map_err(|e| e.to_string())?;
        let reserve = matches.opt_get_default("r", defaults.reserve).map_err(|e| e.to_string())?;

        if views == 0 {
            return Err(String::from("at least one view is required"));
        }
        if view_bytes <= reserve + MARKER_LEN {
            return Err(format!(
                "view-bytes ({}) must exceed reserve ({}) plus the marker trailer ({})",
                view_bytes, reserve, MARKER_LEN,
            ));
        }

        Ok(Config { views, view_bytes, reserve })
    }

    /// Allocates the configured view pool.
    pub fn pool(&self) -> Arc<ViewPool> {
        ViewPool::with_reserve(self.views, self.view_bytes, self.reserve)
    }
}
