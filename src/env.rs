use std::collections::HashMap;
use std::env as stdenv;

/// Snapshot of the process environment used to resolve the config path and
/// the compiler. Tests build one from a fixed set of variables.
#[derive(Debug, Clone, Default)]
pub struct Environment {
    pub vars: HashMap<String, String>,
}

impl Environment {
    pub fn new() -> Self {
        Self {
            vars: stdenv::vars().collect(),
        }
    }

    /// Environment containing exactly `vars`, with no fallback to the process.
    pub fn from_vars<I, K, V>(vars: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        Self {
            vars: vars.into_iter().map(|(k, v)| (k.into(), v.into())).collect(),
        }
    }

    pub fn get_var(&self, key: &str) -> Option<String> {
        self.vars.get(key).filter(|v| !v.is_empty()).cloned()
    }

    pub fn set_var(&mut self, key: impl Into<String>, val: impl Into<String>) {
        self.vars.insert(key.into(), val.into());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_injected_vars_only() {
        let mut env = Environment::from_vars([("HOME", "/home/u"), ("EMPTY", "")]);
        assert_eq!(env.get_var("HOME").as_deref(), Some("/home/u"));
        assert_eq!(env.get_var("EMPTY"), None);
        assert_eq!(env.get_var("CPI_SURELY_UNSET"), None);

        env.set_var("PATH", "/bin");
        assert_eq!(env.get_var("PATH").as_deref(), Some("/bin"));
    }
}
