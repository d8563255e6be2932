//! Config command for Arbor.
//!
//! Shows the effective configuration and what differs from the defaults.

use serde::{Deserialize, Serialize};

use crate::config::Config;

/// Options for the config command.
#[derive(Debug, Clone, Default)]
pub struct ConfigOptions {
    /// Output as JSON.
    pub json: bool,
    /// Suppress output.
    pub quiet: bool,
}

/// A setting that differs from its default.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConfigChange {
    /// Dotted key, e.g. `driver.max_ticks`.
    pub key: String,
    /// Built-in default.
    pub default: String,
    /// Effective value.
    pub value: String,
}

/// Output format for the config command.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConfigOutput {
    /// Effective configuration.
    pub config: Config,
    /// Settings overridden by a config file or the environment.
    pub changes: Vec<ConfigChange>,
}

/// The config command implementation.
pub struct ConfigCommand {
    config: Config,
}

impl ConfigCommand {
    /// Create a new config command over an already loaded config.
    pub fn new(config: Config) -> Self {
        Self { config }
    }

    /// Run the config command.
    pub fn run(&self) -> ConfigOutput {
        let changes = Config::default()
            .diff(&self.config)
            .into_iter()
            .map(|(key, default, value)| ConfigChange {
                key,
                default,
                value,
            })
            .collect();

        ConfigOutput {
            config: self.config.clone(),
            changes,
        }
    }

    /// Format output based on options.
    pub fn format_output(&self, output: &ConfigOutput, options: &ConfigOptions) -> String {
        if options.quiet {
            return String::new();
        }

        if options.json {
            serde_json::to_string_pretty(output).unwrap_or_else(|_| "{}".to_string())
        } else {
            self.format_human_readable(output)
        }
    }

    /// Format output as TOML plus a summary of overrides.
    fn format_human_readable(&self, output: &ConfigOutput) -> String {
        let mut text = toml::to_string_pretty(&output.config)
            .unwrap_or_else(|e| format!("# failed to render config: {}\n", e));

        if output.changes.is_empty() {
            text.push_str("\n# all values are defaults\n");
        } else {
            text.push_str("\n# overridden:\n");
            for change in &output.changes {
                text.push_str(&format!(
                    "#   {} = {} (default {})\n",
                    change.key, change.value, change.default
                ));
            }
        }
        text
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_have_no_changes() {
        let cmd = ConfigCommand::new(Config::default());
        let output = cmd.run();

        assert!(output.changes.is_empty());
        let text = cmd.format_output(&output, &ConfigOptions::default());
        assert!(text.contains("[driver]"));
        assert!(text.contains("max_ticks = 100"));
        assert!(text.contains("all values are defaults"));
    }

    #[test]
    fn test_changes_listed() {
        let mut config = Config::default();
        config.repeat.default_times = "constant,4".to_string();
        let cmd = ConfigCommand::new(config);
        let output = cmd.run();

        assert_eq!(
            output.changes,
            vec![ConfigChange {
                key: "repeat.default_times".to_string(),
                default: "constant,-1".to_string(),
                value: "constant,4".to_string(),
            }]
        );
        let text = cmd.format_output(&output, &ConfigOptions::default());
        assert!(text.contains("repeat.default_times = constant,4 (default constant,-1)"));
    }

    #[test]
    fn test_json_output() {
        let cmd = ConfigCommand::new(Config::default());
        let output = cmd.run();
        let options = ConfigOptions {
            json: true,
            quiet: false,
        };

        let value: serde_json::Value =
            serde_json::from_str(&cmd.format_output(&output, &options)).unwrap();
        assert_eq!(value["config"]["trace"]["capacity"], 1024);
        assert_eq!(value["changes"].as_array().unwrap().len(), 0);
    }

    #[test]
    fn test_quiet() {
        let cmd = ConfigCommand::new(Config::default());
        let options = ConfigOptions {
            json: false,
            quiet: true,
        };
        assert!(cmd.format_output(&cmd.run(), &options).is_empty());
    }
}
