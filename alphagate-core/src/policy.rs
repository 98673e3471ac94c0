//! Security policy for candidate code — immutable whitelist/blacklist sets.
//!
//! Constructed once (defaults or TOML) and passed by reference into the
//! safety and sandbox layers; never mutated at runtime. The defaults encode
//! the gate's contract: data-frame/array libraries, the read-only market-data
//! namespace, date/time, and math are in; process control, filesystem,
//! networking, serialization, FFI, and dynamic-import machinery are out.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;
use thiserror::Error;

/// Errors loading a policy from disk.
#[derive(Debug, Error)]
pub enum PolicyError {
    #[error("failed to read policy file: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to parse policy TOML: {0}")]
    Toml(#[from] toml::de::Error),
}

/// Immutable whitelist/blacklist configuration for Layer 1 and Layer 3.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SecurityPolicy {
    /// Explicitly dangerous root namespaces. Rejected with a stronger message
    /// than a merely unknown module.
    pub forbidden_modules: BTreeSet<String>,
    /// Dangerous built-in operations: dynamic code execution, dynamic import,
    /// file I/O, attribute/environment introspection.
    pub forbidden_builtins: BTreeSet<String>,
    /// Dunder attributes that are harmless to read.
    pub allowed_dunder_attrs: BTreeSet<String>,
    /// Importable root namespaces → the attribute names that may be pulled
    /// out with `from X import name`. An empty set means "import the module,
    /// but no from-imports". Kept last so TOML serialization emits the
    /// scalar lists before this table.
    pub allowed_modules: BTreeMap<String, BTreeSet<String>>,
}

fn set(items: &[&str]) -> BTreeSet<String> {
    items.iter().map(|s| s.to_string()).collect()
}

impl Default for SecurityPolicy {
    fn default() -> Self {
        let mut allowed_modules = BTreeMap::new();
        allowed_modules.insert(
            "pandas".to_string(),
            set(&["DataFrame", "Series", "concat", "merge", "to_datetime"]),
        );
        allowed_modules.insert(
            "numpy".to_string(),
            set(&[
                "abs", "log", "sqrt", "sign", "where", "maximum", "minimum", "nan", "exp", "clip",
            ]),
        );
        allowed_modules.insert(
            "math".to_string(),
            set(&["log", "sqrt", "exp", "floor", "ceil", "pow", "fabs"]),
        );
        allowed_modules.insert(
            "datetime".to_string(),
            set(&["date", "datetime", "timedelta"]),
        );
        allowed_modules.insert(
            "statistics".to_string(),
            set(&["mean", "median", "stdev", "variance"]),
        );
        // Domain market-data/backtesting namespace: read-only data access and
        // simulation entry points only.
        allowed_modules.insert(
            "factorlib".to_string(),
            set(&["load_prices", "load_volume", "run_backtest"]),
        );
        Self {
            allowed_modules,
            forbidden_modules: set(&[
                "os",
                "sys",
                "subprocess",
                "shutil",
                "socket",
                "requests",
                "urllib",
                "http",
                "ftplib",
                "pickle",
                "marshal",
                "shelve",
                "ctypes",
                "cffi",
                "importlib",
                "builtins",
                "io",
                "pathlib",
                "tempfile",
                "multiprocessing",
                "threading",
                "signal",
            ]),
            forbidden_builtins: set(&[
                "eval",
                "exec",
                "compile",
                "__import__",
                "open",
                "input",
                "getattr",
                "setattr",
                "delattr",
                "hasattr",
                "vars",
                "locals",
                "globals",
                "dir",
            ]),
            allowed_dunder_attrs: set(&["__class__", "__name__", "__doc__"]),
        }
    }
}

impl SecurityPolicy {
    /// Load a policy from a TOML file.
    pub fn from_toml_file(path: &Path) -> Result<Self, PolicyError> {
        let text = std::fs::read_to_string(path)?;
        Ok(toml::from_str(&text)?)
    }

    /// Root namespace of a dotted module path: `pandas.tseries` → `pandas`.
    pub fn module_root(module: &str) -> &str {
        module.split('.').next().unwrap_or(module)
    }

    pub fn is_module_allowed(&self, module: &str) -> bool {
        self.allowed_modules
            .contains_key(Self::module_root(module))
    }

    pub fn is_module_forbidden(&self, module: &str) -> bool {
        self.forbidden_modules
            .contains(Self::module_root(module))
    }

    /// Is `from module import name` permitted?
    pub fn is_attr_importable(&self, module: &str, name: &str) -> bool {
        self.allowed_modules
            .get(Self::module_root(module))
            .is_some_and(|attrs| attrs.contains(name))
    }

    pub fn is_forbidden_builtin(&self, name: &str) -> bool {
        self.forbidden_builtins.contains(name)
    }

    /// Attribute-access verdict: dunders outside the allowlist and any
    /// single-underscore-prefixed name are rejected.
    pub fn is_attr_access_allowed(&self, attr: &str) -> bool {
        if attr.starts_with("__") {
            return self.allowed_dunder_attrs.contains(attr);
        }
        !attr.starts_with('_')
    }
}
