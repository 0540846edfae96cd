use serde::Serialize;

use preflight_core::config::AdapterConfig;

/// Placeholder the debugger host's listen port is substituted into.
pub const PORT_PLACEHOLDER: &str = "{port}";

/// Command line for the companion debug-adapter process. The host owns port
/// allocation and process lifecycle; this repo only names the command.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AdapterLaunch {
    pub program: String,
    pub args: Vec<String>,
}

impl AdapterLaunch {
    /// Single-line rendering for diagnostics and editor config snippets.
    pub fn command_line(&self) -> String {
        let mut line = self.program.clone();
        for arg in &self.args {
            line.push(' ');
            line.push_str(arg);
        }
        line
    }
}

/// Expands the configured adapter template against a concrete port.
pub fn adapter_launch(cfg: &AdapterConfig, port: u16) -> AdapterLaunch {
    let port_text = port.to_string();
    AdapterLaunch {
        program: cfg.program.clone(),
        args: cfg
            .port_arg
            .split_whitespace()
            .map(|arg| arg.replace(PORT_PLACEHOLDER, &port_text))
            .collect(),
    }
}
