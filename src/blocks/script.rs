// SPDX-License-Identifier: MIT

//! Script blocks
//!
//! The engine never evaluates code itself. A `ScriptBlock` hands its
//! `script` attribute to an injected [`ScriptEvaluator`].

use indexmap::IndexMap;
use serde_json::Value;
use std::error::Error;
use std::process::Command;
use std::sync::Arc;

use crate::engine::{AttrMap, AttrType, BlockBehavior, BlockError, ExecContext, TypedValue};

/// What a script produced
#[derive(Debug, Default, Clone, PartialEq)]
pub struct ScriptOutput {
    pub results: Option<Value>,
    pub outputs: IndexMap<String, Value>,
}

/// Collaborator that runs script text against resolved attributes
pub trait ScriptEvaluator: Send + Sync {
    fn evaluate(
        &self,
        script: &str,
        attrs: &IndexMap<String, Value>,
    ) -> Result<ScriptOutput, Box<dyn Error + Send + Sync>>;
}

/// Runs scripts with `<shell> -c <script>`.
///
/// Attributes are exported as `BRICK_<NAME>` environment variables (strings
/// as-is, everything else as JSON). Trimmed stdout becomes the results,
/// parsed as JSON when it is valid JSON. A non-zero exit status is an error.
pub struct ShellEvaluator {
    shell: String,
}

impl ShellEvaluator {
    pub fn new(shell: impl Into<String>) -> Self {
        Self {
            shell: shell.into(),
        }
    }

    fn env_name(attr: &str) -> String {
        let cleaned: String = attr
            .chars()
            .map(|c| {
                if c.is_ascii_alphanumeric() {
                    c.to_ascii_uppercase()
                } else {
                    '_'
                }
            })
            .collect();
        format!("BRICK_{}", cleaned)
    }

    fn env_value(value: &Value) -> String {
        match value {
            Value::String(s) => s.clone(),
            other => other.to_string(),
        }
    }
}

impl ScriptEvaluator for ShellEvaluator {
    fn evaluate(
        &self,
        script: &str,
        attrs: &IndexMap<String, Value>,
    ) -> Result<ScriptOutput, Box<dyn Error + Send + Sync>> {
        let output = Command::new(&self.shell)
            .arg("-c")
            .arg(script)
            .envs(
                attrs
                    .iter()
                    .map(|(k, v)| (Self::env_name(k), Self::env_value(v))),
            )
            .output()?;

        let stdout = String::from_utf8_lossy(&output.stdout).trim().to_string();
        let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();

        if !output.status.success() {
            return Err(BlockError::Execution(format!(
                "script exited with {}: {}",
                output.status, stderr
            ))
            .into());
        }

        if !stderr.is_empty() {
            log::warn!("script stderr: {}", stderr);
        }

        let mut result = ScriptOutput::default();
        if !stdout.is_empty() {
            let parsed = serde_json::from_str(&stdout).unwrap_or(Value::String(stdout.clone()));
            result.results = Some(parsed);
        }
        result.outputs.insert("stdout".to_string(), Value::String(stdout));
        Ok(result)
    }
}

/// Block running its `script` attribute through a [`ScriptEvaluator`]
pub struct ScriptBlock {
    evaluator: Arc<dyn ScriptEvaluator>,
}

impl ScriptBlock {
    pub fn new(evaluator: Arc<dyn ScriptEvaluator>) -> Self {
        Self { evaluator }
    }
}

impl BlockBehavior for ScriptBlock {
    fn type_name(&self) -> &str {
        "ScriptBlock"
    }

    fn order(&self) -> u32 {
        10
    }

    fn default_attrs(&self) -> AttrMap {
        let mut attrs = AttrMap::new();
        attrs.insert("script".to_string(), TypedValue::new(AttrType::Script, ""));
        attrs
    }

    fn execute(&self, ctx: &mut ExecContext<'_>) -> Result<(), Box<dyn Error + Send + Sync>> {
        let script = match ctx.attr("script") {
            None | Some(Value::Null) => return Ok(()),
            Some(Value::String(s)) if s.trim().is_empty() => return Ok(()),
            Some(Value::String(s)) => s.clone(),
            Some(_) => return Err(BlockError::Execution("script must be text".into()).into()),
        };

        let output = self.evaluator.evaluate(&script, ctx.attrs())?;
        for (name, value) in output.outputs {
            ctx.set_output(name, value);
        }
        if let Some(results) = output.results {
            ctx.set_results(results);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::{Block, BuildStatus, Builder};
    use serde_json::json;
    use std::sync::Mutex;

    /// Records every script it sees and answers with a fixed output
    struct RecordingEvaluator {
        seen: Mutex<Vec<(String, IndexMap<String, Value>)>>,
        reply: Result<ScriptOutput, String>,
    }

    impl RecordingEvaluator {
        fn replying(reply: Result<ScriptOutput, String>) -> Arc<Self> {
            Arc::new(Self {
                seen: Mutex::new(Vec::new()),
                reply,
            })
        }
    }

    impl ScriptEvaluator for RecordingEvaluator {
        fn evaluate(
            &self,
            script: &str,
            attrs: &IndexMap<String, Value>,
        ) -> Result<ScriptOutput, Box<dyn Error + Send + Sync>> {
            self.seen
                .lock()
                .unwrap()
                .push((script.to_string(), attrs.clone()));
            self.reply.clone().map_err(|e| e.into())
        }
    }

    fn script_builder(evaluator: Arc<RecordingEvaluator>, script: &str) -> Builder {
        let mut builder = Builder::new();
        builder.set_attr("side", TypedValue::new(AttrType::String, "L"));
        let mut block = Block::new(Arc::new(ScriptBlock::new(evaluator))).with_name("s");
        block.set_attr("script", TypedValue::new(AttrType::Script, script));
        builder.add_block(block);
        builder
    }

    #[test]
    fn test_script_sees_runtime_attrs() {
        let mut output = ScriptOutput::default();
        output.results = Some(json!(7));
        output.outputs.insert("joint".to_string(), json!("L_arm"));
        let evaluator = RecordingEvaluator::replying(Ok(output));

        let mut builder = script_builder(Arc::clone(&evaluator), "build()");
        assert_eq!(builder.advance(), BuildStatus::Success);

        let seen = evaluator.seen.lock().unwrap();
        assert_eq!(seen.len(), 1);
        assert_eq!(seen[0].0, "build()");
        assert_eq!(seen[0].1.get("side"), Some(&json!("L")));

        let block = &builder.blocks()[0];
        assert_eq!(block.results(), Some(&json!(7)));
        assert_eq!(block.read_attr("joint"), Some(json!("L_arm")));
    }

    #[test]
    fn test_empty_script_is_a_noop() {
        let evaluator = RecordingEvaluator::replying(Err("should not run".into()));
        let mut builder = script_builder(Arc::clone(&evaluator), "   ");

        assert_eq!(builder.advance(), BuildStatus::Success);
        assert!(evaluator.seen.lock().unwrap().is_empty());
    }

    #[test]
    fn test_evaluator_error_fails_block() {
        let evaluator = RecordingEvaluator::replying(Err("syntax error".into()));
        let mut builder = script_builder(evaluator, "oops(");

        assert_eq!(builder.advance(), BuildStatus::Fail);
        assert!(builder.blocks()[0].log().contains("syntax error"));
    }

    #[test]
    fn test_env_name() {
        assert_eq!(ShellEvaluator::env_name("build_dir"), "BRICK_BUILD_DIR");
        assert_eq!(ShellEvaluator::env_name("my-attr.x"), "BRICK_MY_ATTR_X");
    }

    #[test]
    fn test_env_value() {
        assert_eq!(ShellEvaluator::env_value(&json!("plain")), "plain");
        assert_eq!(ShellEvaluator::env_value(&json!([1, 2])), "[1,2]");
        assert_eq!(ShellEvaluator::env_value(&json!(true)), "true");
    }

    #[cfg(unix)]
    #[test]
    fn test_shell_evaluator_runs_script() {
        let evaluator = ShellEvaluator::new("sh");
        let mut attrs = IndexMap::new();
        attrs.insert("count".to_string(), json!(3));

        let output = evaluator
            .evaluate("echo \"{\\\"count\\\": $BRICK_COUNT}\"", &attrs)
            .unwrap();
        assert_eq!(output.results, Some(json!({"count": 3})));
    }

    #[cfg(unix)]
    #[test]
    fn test_shell_evaluator_plain_text_and_failure() {
        let evaluator = ShellEvaluator::new("sh");
        let attrs = IndexMap::new();

        let output = evaluator.evaluate("echo hello", &attrs).unwrap();
        assert_eq!(output.results, Some(json!("hello")));

        let err = evaluator.evaluate("echo bad >&2; exit 3", &attrs).unwrap_err();
        assert!(err.to_string().contains("bad"));
    }
}
