//! Instance user data.
//!
//! The orchestrator obtains a [`UserDataBuilder`] from a [`UserDataFactory`]
//! handed to it at construction, so tests can substitute their own builder.

use crate::error::{Result, StratusError};
use crate::tags::Tag;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

const BOUNDARY: &str = "==STRATUSBOUNDARY==";
const AGENT_CONFIG_PATH: &str = "/etc/ecs/ecs.config";

/// Assembles the user data document for cluster instances.
pub trait UserDataBuilder: Send {
    /// Queue a user-supplied file as an extra part.
    fn add_file(&mut self, path: &Path) -> Result<()>;

    /// Produce the final user data text.
    fn build(&self) -> Result<String>;
}

/// Creates a builder for a cluster. Tags are passed only when extended
/// container-instance tagging is enabled.
pub type UserDataFactory =
    Arc<dyn Fn(&str, Option<&[Tag]>) -> Box<dyn UserDataBuilder> + Send + Sync>;

/// Factory producing [`MimeUserDataBuilder`]s.
pub fn default_factory() -> UserDataFactory {
    Arc::new(|cluster: &str, tags: Option<&[Tag]>| -> Box<dyn UserDataBuilder> {
        Box::new(MimeUserDataBuilder::new(cluster, tags))
    })
}

#[derive(Debug, Clone)]
struct Part {
    content_type: &'static str,
    body: String,
}

/// Multipart MIME user data: an agent configuration script followed by
/// one part per user file.
#[derive(Debug, Clone)]
pub struct MimeUserDataBuilder {
    cluster: String,
    tags: Option<Vec<Tag>>,
    parts: Vec<(PathBuf, Part)>,
}

impl MimeUserDataBuilder {
    pub fn new(cluster: &str, tags: Option<&[Tag]>) -> Self {
        Self { cluster: cluster.to_string(), tags: tags.map(<[Tag]>::to_vec), parts: Vec::new() }
    }

    fn agent_script(&self) -> Result<String> {
        let mut script = String::from("#!/bin/bash\n");
        script.push_str(&format!("echo 'ECS_CLUSTER={}' >> {}\n", self.cluster, AGENT_CONFIG_PATH));
        if let Some(tags) = self.tags.as_deref().filter(|t| !t.is_empty()) {
            let map: BTreeMap<&str, &str> =
                tags.iter().map(|t| (t.key.as_str(), t.value.as_str())).collect();
            let json = serde_json::to_string(&map).map_err(StratusError::internal)?;
            script.push_str(&format!(
                "echo 'ECS_CONTAINER_INSTANCE_TAGS={}' >> {}\n",
                json, AGENT_CONFIG_PATH
            ));
        }
        Ok(script)
    }
}

fn content_type_for(path: &Path, body: &str) -> Result<&'static str> {
    let first_line = body.lines().next().unwrap_or_default().trim();
    if first_line.starts_with("#cloud-config") {
        Ok("text/cloud-config")
    } else if first_line.starts_with("#!") {
        Ok("text/x-shellscript")
    } else {
        Err(StratusError::validation(format!(
            "Unsupported user data format in {}: expected a shell script or #cloud-config",
            path.display()
        )))
    }
}

impl UserDataBuilder for MimeUserDataBuilder {
    fn add_file(&mut self, path: &Path) -> Result<()> {
        let body = std::fs::read_to_string(path)
            .map_err(|e| StratusError::Io { path: path.to_path_buf(), source: e })?;
        let content_type = content_type_for(path, &body)?;
        self.parts.push((path.to_path_buf(), Part { content_type, body }));
        Ok(())
    }

    fn build(&self) -> Result<String> {
        let mut out = String::new();
        out.push_str(&format!(
            "Content-Type: multipart/mixed; boundary=\"{}\"\nMIME-Version: 1.0\n\n",
            BOUNDARY
        ));

        let agent = Part { content_type: "text/x-shellscript", body: self.agent_script()? };
        for part in std::iter::once(&agent).chain(self.parts.iter().map(|(_, p)| p)) {
            out.push_str(&format!("--{}\n", BOUNDARY));
            out.push_str(&format!("Content-Type: {}; charset=\"us-ascii\"\n\n", part.content_type));
            out.push_str(&part.body);
            if !part.body.ends_with('\n') {
                out.push('\n');
            }
            out.push('\n');
        }
        out.push_str(&format!("--{}--\n", BOUNDARY));
        Ok(out)
    }
}
