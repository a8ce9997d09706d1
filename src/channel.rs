//! Running commands on devices
//!
//! [CommandChannel] executes a list of commands on one device in one connection. When
//! structured output is requested the raw text goes through the platform's parser in
//! [crate::brand]; commands without a parser come back as text.

use std::{collections::BTreeMap, future::Future, net::SocketAddr, time::Duration};

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::{PortTrackError, brand::parse_output, inventory::DeviceRecord, ssh::SshClient};

/// One parsed line of command output, keyed by column name.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Row(BTreeMap<String, String>);

impl Row {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.insert(key, value);
        self
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.0.insert(key.into(), value.into());
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.0.get(key).map(String::as_str)
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for Row {
    fn from_iter<T: IntoIterator<Item = (K, V)>>(iter: T) -> Self {
        Self(
            iter.into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        )
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum CommandOutput {
    Rows(Vec<Row>),
    Text(String),
}

impl CommandOutput {
    pub fn rows(&self) -> Option<&[Row]> {
        match self {
            CommandOutput::Rows(rows) => Some(rows),
            CommandOutput::Text(_) => None,
        }
    }

    /// Render as text; parsed rows become one line of space separated values each.
    pub fn into_text(self) -> String {
        match self {
            CommandOutput::Text(text) => text,
            CommandOutput::Rows(rows) => rows
                .iter()
                .map(|row| row.0.values().cloned().collect::<Vec<_>>().join(" "))
                .collect::<Vec<_>>()
                .join("\n"),
        }
    }
}

pub trait CommandChannel: Send + Sync + 'static {
    /// Run `commands` in order on `device`, returning one output per command.
    ///
    /// Any connection, authentication or transport failure fails the whole call; partial
    /// output is never returned.
    fn execute(
        &self,
        device: &DeviceRecord,
        commands: &[String],
        parsed: bool,
    ) -> impl Future<Output = Result<Vec<CommandOutput>, PortTrackError>> + Send;
}

/// [CommandChannel] over SSH exec channels.
#[derive(Debug, Clone)]
pub struct SshChannel {
    port: u16,
    timeout: Duration,
}

impl SshChannel {
    pub fn new(port: u16, timeout: Duration) -> Self {
        Self { port, timeout }
    }
}

impl CommandChannel for SshChannel {
    #[allow(clippy::manual_async_fn)]
    fn execute(
        &self,
        device: &DeviceRecord,
        commands: &[String],
        parsed: bool,
    ) -> impl Future<Output = Result<Vec<CommandOutput>, PortTrackError>> + Send {
        async move {
            let credentials = &device.credentials;
            let ssh_client = SshClient::connect(
                SocketAddr::new(device.address, self.port),
                &credentials.username,
                credentials.password.as_deref(),
                credentials.key_path.as_deref(),
                credentials.key_passphrase.as_deref(),
                self.timeout,
            )
            .await?;

            let result = run_commands(&ssh_client, device, commands, parsed).await;
            ssh_client.disconnect().await;
            result
        }
    }
}

async fn run_commands(
    ssh_client: &SshClient,
    device: &DeviceRecord,
    commands: &[String],
    parsed: bool,
) -> Result<Vec<CommandOutput>, PortTrackError> {
    let mut outputs = Vec::with_capacity(commands.len());
    for command in commands {
        let raw = ssh_client.execute_command(command).await?;
        let output = if parsed {
            parse_output(&device.brand, command, &raw)?
        } else {
            CommandOutput::Text(raw)
        };
        outputs.push(output);
    }
    debug!(
        "Ran {} command(s) on {}",
        outputs.len(),
        ssh_client.address()
    );
    Ok(outputs)
}
