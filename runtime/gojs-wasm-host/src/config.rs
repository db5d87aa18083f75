use std::env;
use std::path::{Path, PathBuf};

use anyhow::Result;
use tracing::debug;
use wasmtime::{Cache, Config, Engine, OptLevel};

const DEFAULT_MAX_STACK: usize = 8 * 1024 * 1024;

/// Engine knobs, read once from `GOJS_WASM_*` variables.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct HostConfig {
    pub max_stack: usize,
    pub compile_fast: bool,
    pub compile_serial: bool,
    pub cache: CacheMode,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum CacheMode {
    Off,
    Default,
    File(PathBuf),
}

impl Default for HostConfig {
    fn default() -> Self {
        Self {
            max_stack: DEFAULT_MAX_STACK,
            compile_fast: false,
            compile_serial: false,
            cache: CacheMode::Off,
        }
    }
}

impl HostConfig {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| env::var(key).ok())
    }

    pub fn from_lookup(var: impl Fn(&str) -> Option<String>) -> Self {
        let max_stack = var("GOJS_WASM_MAX_STACK")
            .and_then(|val| val.parse::<usize>().ok())
            .filter(|val| *val > 0)
            .unwrap_or(DEFAULT_MAX_STACK);
        let cache_toggle = var("GOJS_WASM_CACHE");
        let cache = match (cache_toggle.as_deref(), var("GOJS_WASM_CACHE_CONFIG")) {
            (Some("0"), _) => CacheMode::Off,
            (_, Some(path)) => CacheMode::File(PathBuf::from(path)),
            (Some("1"), None) => CacheMode::Default,
            _ => CacheMode::Off,
        };
        Self {
            max_stack,
            compile_fast: var("GOJS_WASM_COMPILE_FAST").as_deref() == Some("1"),
            compile_serial: var("GOJS_WASM_COMPILE_SERIAL").as_deref() == Some("1"),
            cache,
        }
    }

    pub fn build_engine(&self) -> Result<Engine> {
        let mut config = Config::new();
        config.max_wasm_stack(self.max_stack);
        debug!(max_stack = self.max_stack, "wasmtime max_wasm_stack");
        match &self.cache {
            CacheMode::Off => {}
            CacheMode::Default => {
                config.cache(Some(Cache::from_file(None)?));
                debug!("wasmtime cache enabled with default config");
            }
            CacheMode::File(path) => {
                config.cache(Some(Cache::from_file(Some(Path::new(path)))?));
                debug!(path = %path.display(), "wasmtime cache enabled");
            }
        }
        if self.compile_serial {
            config.parallel_compilation(false);
            debug!("wasmtime parallel compilation disabled");
        }
        if self.compile_fast {
            config.cranelift_opt_level(OptLevel::None);
            debug!("wasmtime opt level set to none");
        }
        Ok(Engine::new(&config)?)
    }
}
