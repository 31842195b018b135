//! Process execution.

use std::collections::BTreeMap;
use std::process::Stdio;
use std::sync::Arc;

use miette::miette;
use serde_json::{Value, json};
use templar_core::caps::CapabilityFn;

use crate::{CapContext, args};

pub(crate) fn register(funcs: &mut BTreeMap<&'static str, CapabilityFn>, ctx: &CapContext) {
    {
        let ctx = ctx.clone();
        funcs.insert(
            "exec",
            Arc::new(move |argv: Vec<Value>| {
                let ctx = ctx.clone();
                Box::pin(async move {
                    let command = args::string("exec", &argv, 0, "command")?;
                    let command_args = args::opt_string_array("exec", &argv, 1, "args")?;
                    run_command(command, command_args, None, &ctx).await
                })
            }),
        );
    }
    {
        let ctx = ctx.clone();
        funcs.insert(
            "exec_with_env",
            Arc::new(move |argv: Vec<Value>| {
                let ctx = ctx.clone();
                Box::pin(async move {
                    let command = args::string("exec_with_env", &argv, 0, "command")?;
                    let command_args = args::opt_string_array("exec_with_env", &argv, 1, "args")?;
                    let env = args::opt_string_map("exec_with_env", &argv, 2, "env")?;
                    run_command(command, command_args, env, &ctx).await
                })
            }),
        );
    }
}

/// Runs the command to completion and reports `{stdout, stderr, exit_code}`.
/// A nonzero exit is a result, not an error; spawn failures, the timeout
/// and cancellation are errors. Extra `env` entries are appended to the
/// inherited environment.
async fn run_command(
    command: String,
    command_args: Vec<String>,
    env: Option<BTreeMap<String, String>>,
    ctx: &CapContext,
) -> miette::Result<Value> {
    let mut cmd = tokio::process::Command::new(&command);
    cmd.args(&command_args)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);
    if let Some(env) = env {
        cmd.envs(env);
    }

    let child = cmd
        .spawn()
        .map_err(|e| miette!("failed to execute command: {e}"))?;

    let output = tokio::select! {
        output = child.wait_with_output() => {
            output.map_err(|e| miette!("failed to execute command: {e}"))?
        }
        _ = tokio::time::sleep(ctx.exec_timeout) => {
            return Err(miette!("command execution timed out"));
        }
        _ = ctx.cancel.cancelled() => {
            return Err(miette!("command execution was cancelled"));
        }
    };

    Ok(json!({
        "stdout": String::from_utf8_lossy(&output.stdout),
        "stderr": String::from_utf8_lossy(&output.stderr),
        "exit_code": output.status.code().unwrap_or(-1),
    }))
}
