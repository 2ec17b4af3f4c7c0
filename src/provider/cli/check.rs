//! Availability and verification of CLI backends.

use std::path::PathBuf;
use std::process::Stdio;
use std::time::Duration;

use futures::StreamExt;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use super::{create_cli_provider, install_hint, locate, login_hint};
use crate::config::SageConfig;
use crate::error::SageError;
use crate::models::CliKind;
use crate::provider::ProviderRequest;
use crate::types::{Message, StreamEvent};

const VERSION_TIMEOUT: Duration = Duration::from_secs(15);
const VERIFY_PROMPT: &str = "Reply with the single word OK.";

/// Run `<executable> --version`. Returns the resolved path and the
/// reported version on success.
pub async fn check_available(
    kind: CliKind,
    config: &SageConfig,
) -> Result<(PathBuf, String), SageError> {
    let executable = locate::resolve(kind, config);
    let mut command = tokio::process::Command::new(&executable);
    command
        .arg("--version")
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);

    let output = match tokio::time::timeout(VERSION_TIMEOUT, command.output()).await {
        Err(_) => {
            return Err(SageError::unavailable(
                kind.display_name(),
                format!(
                    "`{} --version` did not respond within {}s",
                    executable.display(),
                    VERSION_TIMEOUT.as_secs()
                ),
            ));
        }
        Ok(Err(err)) if err.kind() == std::io::ErrorKind::NotFound => {
            return Err(SageError::unavailable(
                kind.display_name(),
                format!("`{}` was not found. {}", executable.display(), install_hint(kind)),
            ));
        }
        Ok(Err(err)) => {
            return Err(SageError::unavailable(
                kind.display_name(),
                format!("failed to run `{}`: {err}", executable.display()),
            ));
        }
        Ok(Ok(output)) => output,
    };

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        return Err(SageError::unavailable(
            kind.display_name(),
            format!(
                "`{} --version` failed ({}): {}. {}",
                executable.display(),
                output.status,
                stderr.trim(),
                install_hint(kind)
            ),
        ));
    }

    let version = String::from_utf8_lossy(&output.stdout).trim().to_string();
    debug!(backend = kind.as_str(), %version, "CLI backend available");
    Ok((executable, version))
}

/// Send a trivial prompt and require a clean exit.
///
/// Any failure is reported as [`SageError::Unavailable`] with log-in
/// instructions, since an installed but unusable backend is almost always
/// missing credentials.
pub async fn verify(kind: CliKind, config: &SageConfig) -> Result<(), SageError> {
    let provider = create_cli_provider(kind, "", config, None);
    let request = ProviderRequest {
        messages: vec![Message::user(VERIFY_PROMPT)],
        ..Default::default()
    };

    let failure = |detail: String| {
        SageError::unavailable(kind.display_name(), format!("{detail}. {}", login_hint(kind)))
    };

    let mut stream = match provider.stream(&request, CancellationToken::new()).await {
        Ok(stream) => stream,
        Err(err @ SageError::Unavailable { .. }) => return Err(err),
        Err(err) => return Err(failure(err.to_string())),
    };

    while let Some(event) = stream.next().await {
        match event {
            StreamEvent::Error(err) => return Err(failure(err.to_string())),
            StreamEvent::Aborted => return Err(failure("verification aborted".to_string())),
            _ => {}
        }
    }
    Ok(())
}

/// Backends whose version check passes, in [`CliKind::ALL`] order.
pub async fn available_backends(config: &SageConfig) -> Vec<CliKind> {
    let mut available = Vec::new();
    for kind in CliKind::ALL {
        match check_available(kind, config).await {
            Ok(_) => available.push(kind),
            Err(err) => debug!(backend = kind.as_str(), error = %err, "CLI backend unavailable"),
        }
    }
    available
}
