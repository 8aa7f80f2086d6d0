//! Building one worker invocation from a specification and a slot.

use thiserror::Error;

use crate::env::EnvSlot;
use crate::spec::SpecId;

/// Placeholder in the command template replaced by the specification
/// identifier. When absent, the identifier is appended as the final
/// argument instead.
pub const SPEC_PLACEHOLDER: &str = "{spec}";

/// Error raised for an unusable command template.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TemplateError {
    /// The configured worker command has no elements at all.
    #[error("worker command template must not be empty")]
    Empty,
}

/// Validated base command template for worker invocations.
///
/// The template is an argv-style vector — arguments stay discrete elements
/// and are never joined into a shell string, so identifiers containing
/// spaces or shell metacharacters pass through untouched.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandTemplate {
    argv: Vec<String>,
}

impl CommandTemplate {
    /// Validate and wrap a template vector.
    pub fn new(argv: Vec<String>) -> Result<Self, TemplateError> {
        if argv.is_empty() {
            return Err(TemplateError::Empty);
        }
        Ok(Self { argv })
    }

    /// The template's argument vector.
    pub fn argv(&self) -> &[String] {
        &self.argv
    }
}

/// One ready-to-launch worker invocation.
///
/// Transient value: created immediately before a worker is spawned, owned by
/// that worker's lifecycle, discarded when it finishes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkerTask {
    /// The specification this worker will execute.
    pub spec: SpecId,
    /// Index of the environment slot the worker runs under.
    pub slot_index: usize,
    /// Full argument vector, program name first.
    pub command: Vec<String>,
    /// Environment variables applied to the subprocess, in slot order.
    /// The spawner merges these over the parent process environment; on a
    /// key collision the slot value wins.
    pub env: Vec<(String, String)>,
}

/// Pure mapping from (template, specification, slot) to a worker task.
///
/// Deterministic: the same inputs always produce byte-identical output, so
/// a rerun of a cached failure launches the worker exactly as the original
/// run did.
#[derive(Debug, Clone)]
pub struct ArgumentsBuilder {
    template: CommandTemplate,
}

impl ArgumentsBuilder {
    pub fn new(template: CommandTemplate) -> Self {
        Self { template }
    }

    /// Build the concrete invocation for one specification under one slot.
    pub fn build(&self, spec: &SpecId, slot: &EnvSlot) -> WorkerTask {
        let mut substituted = false;
        let mut command: Vec<String> = self
            .template
            .argv()
            .iter()
            .map(|arg| {
                if arg.contains(SPEC_PLACEHOLDER) {
                    substituted = true;
                    arg.replace(SPEC_PLACEHOLDER, spec.as_str())
                } else {
                    arg.clone()
                }
            })
            .collect();

        if !substituted {
            command.push(spec.as_str().to_string());
        }

        WorkerTask {
            spec: spec.clone(),
            slot_index: slot.index(),
            command,
            env: slot.vars().to_vec(),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use crate::env::{EnvironmentPool, LeasedSlot};

    use super::*;

    fn template(args: &[&str]) -> CommandTemplate {
        CommandTemplate::new(args.iter().map(|a| a.to_string()).collect()).expect("template")
    }

    fn slot_with(vars: Vec<(String, String)>) -> LeasedSlot {
        let pool = EnvironmentPool::from_environments(vec![vars], Duration::from_secs(1));
        tokio_test::block_on(pool.acquire()).expect("slot")
    }

    #[test]
    fn test_empty_template_is_rejected() {
        assert_eq!(CommandTemplate::new(Vec::new()), Err(TemplateError::Empty));
    }

    #[test]
    fn test_identifier_appended_when_no_placeholder() {
        let builder = ArgumentsBuilder::new(template(&["behat", "--strict"]));
        let slot = slot_with(Vec::new());

        let task = builder.build(&SpecId::new("features/login.feature"), &slot);
        assert_eq!(task.command, vec!["behat", "--strict", "features/login.feature"]);
    }

    #[test]
    fn test_placeholder_is_substituted_in_place() {
        let builder = ArgumentsBuilder::new(template(&["behat", "--name", "{spec}", "--strict"]));
        let slot = slot_with(Vec::new());

        let task = builder.build(&SpecId::new("features/login.feature:12"), &slot);
        assert_eq!(
            task.command,
            vec!["behat", "--name", "features/login.feature:12", "--strict"]
        );
    }

    #[test]
    fn test_slot_variables_are_carried_in_order() {
        let builder = ArgumentsBuilder::new(template(&["behat"]));
        let vars = vec![
            ("CACHE_DIR".to_string(), "00-test".to_string()),
            ("SYMFONY_SERVER_PORT".to_string(), "8000".to_string()),
        ];
        let slot = slot_with(vars.clone());

        let task = builder.build(&SpecId::new("features/a.feature"), &slot);
        assert_eq!(task.env, vars);
        assert_eq!(task.slot_index, 0);
    }

    /// Determinism: repeated builds from the same inputs are byte-identical.
    #[test]
    fn test_build_is_deterministic() {
        let builder = ArgumentsBuilder::new(template(&["behat", "--suite={spec}"]));
        let slot = slot_with(vec![("PORT".to_string(), "8001".to_string())]);
        let spec = SpecId::new("features/checkout.feature");

        let first = builder.build(&spec, &slot);
        let second = builder.build(&spec, &slot);
        assert_eq!(first, second);
    }
}
