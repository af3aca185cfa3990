//! Polling policy configuration

use crate::error::{Error, Result};
use crate::poll::ErrorKind;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::Duration;

/// Polling policy configurations
///
/// ```yaml
/// default:
///   max-tries: 60
///   initial-delay-ms: 2000
/// resources:
///   dns-propagation:
///     timeout-ms: 600000
///     step: linear-doubling
///     max-delay-ms: 60000
///     ignore: [not-found]
/// ```
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct PollPoliciesConfig {
    /// Policy used when a resource has no entry of its own
    #[serde(default)]
    pub default: PollPolicy,

    /// Per-resource policies, keyed by what is being waited for
    #[serde(default)]
    pub resources: HashMap<String, PollPolicy>,
}

impl PollPoliciesConfig {
    /// Parse and validate policies from YAML text
    pub fn from_yaml(text: &str) -> Result<Self> {
        let config: Self = serde_yaml_ng::from_str(text)?;
        config.default.validate()?;
        for (name, policy) in &config.resources {
            policy
                .validate()
                .map_err(|e| Error::invalid_config(format!("resource '{}': {}", name, e)))?;
        }
        Ok(config)
    }

    /// The policy for a resource, falling back to the default policy
    pub fn policy_for(&self, resource: &str) -> &PollPolicy {
        self.resources.get(resource).unwrap_or(&self.default)
    }
}

/// Policy for one polling run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct PollPolicy {
    /// Maximum number of probe calls; absent or zero means unbounded
    #[serde(default)]
    pub max_tries: Option<u32>,

    /// Deadline in milliseconds from the start of the run
    #[serde(default)]
    pub timeout_ms: Option<u64>,

    /// Delay before the second call in milliseconds
    #[serde(default = "default_initial_delay")]
    pub initial_delay_ms: u64,

    /// Upper bound for every recomputed delay in milliseconds
    #[serde(default)]
    pub max_delay_ms: Option<u64>,

    /// Step strategy
    #[serde(default)]
    pub step: StepKind,

    /// Probe error kinds retried instead of aborting the run
    #[serde(default)]
    pub ignore: Vec<ErrorKind>,

    /// Return every observed value instead of only the accepted one
    #[serde(default)]
    pub collect_values: bool,

    /// Lengthen each sleep by a random amount of up to 25%
    #[serde(default)]
    pub jitter: bool,
}

impl Default for PollPolicy {
    fn default() -> Self {
        Self {
            max_tries: None,
            timeout_ms: None,
            initial_delay_ms: default_initial_delay(),
            max_delay_ms: None,
            step: StepKind::default(),
            ignore: Vec::new(),
            collect_values: false,
            jitter: false,
        }
    }
}

fn default_initial_delay() -> u64 {
    1000
}

impl PollPolicy {
    /// Parse and validate a policy from YAML text
    pub fn from_yaml(text: &str) -> Result<Self> {
        let policy: Self = serde_yaml_ng::from_str(text)?;
        policy.validate()?;
        Ok(policy)
    }

    /// Check that the delay settings are coherent
    pub fn validate(&self) -> Result<()> {
        if let Some(max_delay_ms) = self.max_delay_ms {
            if max_delay_ms < self.initial_delay_ms {
                return Err(Error::invalid_config(format!(
                    "max-delay-ms ({}) is below initial-delay-ms ({})",
                    max_delay_ms, self.initial_delay_ms
                )));
            }
            if max_delay_ms == 0 && self.initial_delay_ms == 0 {
                return Err(Error::invalid_config(
                    "initial-delay-ms and max-delay-ms are both zero",
                ));
            }
        }
        Ok(())
    }

    /// The deadline as a duration
    pub fn timeout(&self) -> Option<Duration> {
        self.timeout_ms.map(Duration::from_millis)
    }

    /// The initial delay as a duration
    pub fn initial_delay(&self) -> Duration {
        Duration::from_millis(self.initial_delay_ms)
    }

    /// The delay cap as a duration
    pub fn max_delay(&self) -> Option<Duration> {
        self.max_delay_ms.map(Duration::from_millis)
    }
}

/// Built-in step strategies
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "kebab-case")]
pub enum StepKind {
    /// Same delay between every call (default)
    #[default]
    Constant,

    /// Delay grows by `max(delay, 1s)` after every call
    LinearDoubling,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_poll_policy_defaults() {
        let policy = PollPolicy::default();
        assert_eq!(policy.max_tries, None);
        assert_eq!(policy.timeout(), None);
        assert_eq!(policy.initial_delay(), Duration::from_secs(1));
        assert_eq!(policy.max_delay(), None);
        assert_eq!(policy.step, StepKind::Constant);
        assert!(policy.ignore.is_empty());
        assert!(!policy.collect_values);
        assert!(!policy.jitter);
    }

    #[test]
    fn test_poll_policy_from_yaml() {
        let policy = PollPolicy::from_yaml(
            r#"
max-tries: 30
timeout-ms: 120000
initial-delay-ms: 500
max-delay-ms: 8000
step: linear-doubling
ignore: [server, transient]
collect-values: true
"#,
        )
        .unwrap();

        assert_eq!(policy.max_tries, Some(30));
        assert_eq!(policy.timeout(), Some(Duration::from_secs(120)));
        assert_eq!(policy.initial_delay(), Duration::from_millis(500));
        assert_eq!(policy.max_delay(), Some(Duration::from_secs(8)));
        assert_eq!(policy.step, StepKind::LinearDoubling);
        assert_eq!(policy.ignore, vec![ErrorKind::Server, ErrorKind::Transient]);
        assert!(policy.collect_values);
        assert!(!policy.jitter);
    }

    #[test]
    fn test_poll_policy_empty_yaml_uses_defaults() {
        let policy = PollPolicy::from_yaml("{}").unwrap();
        assert_eq!(policy, PollPolicy::default());
    }

    #[test]
    fn test_poll_policy_rejects_unknown_step() {
        let err = PollPolicy::from_yaml("step: exponential").unwrap_err();
        assert!(matches!(err, Error::YamlParse(_)));
    }

    #[test]
    fn test_poll_policy_validation() {
        let policy = PollPolicy {
            initial_delay_ms: 2000,
            max_delay_ms: Some(1000),
            ..PollPolicy::default()
        };
        let err = policy.validate().unwrap_err();
        assert!(err.to_string().contains("max-delay-ms (1000)"));

        let policy = PollPolicy {
            initial_delay_ms: 0,
            max_delay_ms: Some(0),
            ..PollPolicy::default()
        };
        assert!(policy.validate().is_err());

        let policy = PollPolicy {
            initial_delay_ms: 0,
            ..PollPolicy::default()
        };
        assert!(policy.validate().is_ok());
    }

    #[test]
    fn test_poll_policy_serialization() {
        let policy = PollPolicy {
            max_tries: Some(5),
            ignore: vec![ErrorKind::NotFound],
            ..PollPolicy::default()
        };
        let yaml = serde_yaml_ng::to_string(&policy).unwrap();
        assert!(yaml.contains("max-tries: 5"));
        assert!(yaml.contains("initial-delay-ms: 1000"));
        assert!(yaml.contains("- not-found"));
    }

    #[test]
    fn test_policies_config_lookup() {
        let config = PollPoliciesConfig::from_yaml(
            r#"
default:
  max-tries: 60
resources:
  dns-propagation:
    timeout-ms: 600000
    step: linear-doubling
"#,
        )
        .unwrap();

        assert_eq!(config.policy_for("instance-running").max_tries, Some(60));
        let dns = config.policy_for("dns-propagation");
        assert_eq!(dns.max_tries, None);
        assert_eq!(dns.step, StepKind::LinearDoubling);
    }

    #[test]
    fn test_policies_config_reports_invalid_resource() {
        let err = PollPoliciesConfig::from_yaml(
            r#"
resources:
  snapshot-ready:
    initial-delay-ms: 5000
    max-delay-ms: 100
"#,
        )
        .unwrap_err();

        assert!(err.to_string().contains("resource 'snapshot-ready'"));
    }
}
