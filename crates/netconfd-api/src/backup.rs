// Persistence of the running configuration
//
// `save_running` shells out to the platform's save command (which writes the
// startup file); `upload_startup` ships that file to a remote URL as a
// multipart form.

use std::path::PathBuf;

use reqwest::multipart::{Form, Part};
use tracing::{debug, info};
use url::Url;

use crate::error::Error;
use crate::transport::TransportConfig;

/// Default save command on SONiC-style systems.
pub const DEFAULT_SAVE_COMMAND: &str = "sonic-cfggen -d --print-data > /etc/sonic/config_db.json";
/// Default location of the startup configuration.
pub const DEFAULT_STARTUP_FILE: &str = "/etc/sonic/config_db.json";

pub struct SystemPersistence {
    http: reqwest::Client,
    save_command: String,
    startup_file: PathBuf,
}

impl SystemPersistence {
    pub fn new(
        save_command: impl Into<String>,
        startup_file: impl Into<PathBuf>,
        transport: &TransportConfig,
    ) -> Result<Self, Error> {
        Ok(Self::with_client(
            transport.build_client()?,
            save_command,
            startup_file,
        ))
    }

    pub fn with_client(
        http: reqwest::Client,
        save_command: impl Into<String>,
        startup_file: impl Into<PathBuf>,
    ) -> Self {
        Self {
            http,
            save_command: save_command.into(),
            startup_file: startup_file.into(),
        }
    }

    /// Run the save command through `sh -c`.
    pub async fn save_running(&self) -> Result<(), Error> {
        debug!(command = %self.save_command, "saving running configuration");
        let output = tokio::process::Command::new("sh")
            .arg("-c")
            .arg(&self.save_command)
            .output()
            .await?;

        if output.status.success() {
            info!("running configuration saved");
            return Ok(());
        }

        let stderr = String::from_utf8_lossy(&output.stderr);
        Err(Error::Command {
            command: self.save_command.clone(),
            message: match output.status.code() {
                Some(code) => format!("exit status {code}: {}", stderr.trim()),
                None => format!("terminated by signal: {}", stderr.trim()),
            },
        })
    }

    /// POST the startup file to `url` as the multipart field `files`.
    ///
    /// Only 200, 201 and 204 count as success.
    pub async fn upload_startup(&self, url: &str) -> Result<(), Error> {
        let url = Url::parse(url)?;
        let contents = tokio::fs::read(&self.startup_file).await?;
        let file_name = self
            .startup_file
            .file_name()
            .map_or_else(|| "startup.json".to_owned(), |n| n.to_string_lossy().into_owned());

        debug!(%url, file = %self.startup_file.display(), bytes = contents.len(), "uploading startup configuration");
        let form = Form::new().part("files", Part::bytes(contents).file_name(file_name));
        let resp = self.http.post(url.clone()).multipart(form).send().await?;

        match resp.status().as_u16() {
            200 | 201 | 204 => {
                info!(%url, "startup configuration uploaded");
                Ok(())
            }
            status => Err(Error::UploadRejected {
                url: url.to_string(),
                status,
            }),
        }
    }
}
