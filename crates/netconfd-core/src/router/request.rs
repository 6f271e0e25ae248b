// ── RPC request parsing ──
//
// The XML document borrows the raw message, so everything a handler needs
// is compiled into owned values up front.

use crate::catalog::KeyCatalog;
use crate::compile::{
    ActionRequest, ConfigEdit, CopyRequest, GetRequest, SchemaRequest, compile_copy_config,
    compile_edit, compile_get, compile_get_schema, compile_sonic_rpc, target_datastore,
};
use crate::error::CoreError;
use crate::xml;

/// A decoded `<rpc>`.
#[derive(Debug)]
pub struct Request {
    pub message_id: String,
    pub rpc: Rpc,
}

/// Operation-specific body.
///
/// Some bodies keep their compile result so the error surfaces where the
/// handler would have hit it: edit-config after the lock check, get-schema
/// after authorization.
#[derive(Debug)]
pub enum Rpc {
    Get {
        command: &'static str,
        reads: Vec<GetRequest>,
    },
    EditConfig {
        edits: Result<Vec<ConfigEdit>, CoreError>,
    },
    GetSchema(Result<SchemaRequest, CoreError>),
    Commit,
    CloseSession,
    Lock,
    Unlock,
    SonicRpc(Vec<ActionRequest>),
    CopyConfig(CopyRequest),
}

impl Rpc {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Get { command, .. } => *command,
            Self::EditConfig { .. } => "edit-config",
            Self::GetSchema(_) => "get-schema",
            Self::Commit => "commit",
            Self::CloseSession => "close-session",
            Self::Lock => "lock",
            Self::Unlock => "unlock",
            Self::SonicRpc(_) => "sonic-rpc",
            Self::CopyConfig(_) => "copy-config",
        }
    }
}

fn running_target(operation: roxmltree::Node<'_, '_>) -> Result<(), CoreError> {
    if target_datastore(operation)? == "running" {
        Ok(())
    } else {
        Err(CoreError::TargetNotRunning)
    }
}

/// Parse one framed message. On error the caller falls back to a
/// best-effort message-id.
pub fn parse(raw: &str, catalog: &KeyCatalog) -> Result<Request, CoreError> {
    let doc = xml::parse(raw)?;
    let root = doc.root_element();
    if xml::local_name(root) != "rpc" {
        return Err(CoreError::MalformedXml);
    }

    let message_id = root
        .attribute("message-id")
        .map(str::trim)
        .filter(|id| !id.is_empty())
        .ok_or(CoreError::MissingMessageId)?
        .to_owned();

    let operation = xml::first_child_element(root).ok_or_else(|| CoreError::Unsupported {
        operation: String::new(),
    })?;

    let rpc = match xml::local_name(operation) {
        "get" => Rpc::Get {
            command: "get",
            reads: compile_get(operation, catalog)?,
        },
        "get-config" => Rpc::Get {
            command: "get-config",
            reads: compile_get(operation, catalog)?,
        },
        "edit-config" => Rpc::EditConfig {
            edits: compile_edit(operation, catalog),
        },
        "get-schema" => Rpc::GetSchema(compile_get_schema(operation)),
        "commit" => Rpc::Commit,
        "close-session" => Rpc::CloseSession,
        "lock" => {
            running_target(operation)?;
            Rpc::Lock
        }
        "unlock" => {
            running_target(operation)?;
            Rpc::Unlock
        }
        "sonic-rpc" => Rpc::SonicRpc(compile_sonic_rpc(operation)),
        "copy-config" => Rpc::CopyConfig(compile_copy_config(operation)?),
        other => {
            return Err(CoreError::Unsupported {
                operation: other.to_owned(),
            });
        }
    };

    Ok(Request { message_id, rpc })
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn catalog() -> KeyCatalog {
        KeyCatalog::default()
    }

    #[test]
    fn message_id_required() {
        let err = parse("<rpc><commit/></rpc>", &catalog()).unwrap_err();
        assert!(matches!(err, CoreError::MissingMessageId));
        let err = parse(r#"<rpc message-id=" "><commit/></rpc>"#, &catalog()).unwrap_err();
        assert!(matches!(err, CoreError::MissingMessageId));
    }

    #[test]
    fn operations_resolve_by_local_name() {
        let request = parse(
            r#"<nc:rpc xmlns:nc="urn:ietf:params:xml:ns:netconf:base:1.0" message-id="101"><nc:commit/></nc:rpc>"#,
            &catalog(),
        )
        .unwrap();
        assert_eq!(request.message_id, "101");
        assert_eq!(request.rpc.name(), "commit");
    }

    #[test]
    fn lock_target_must_be_running() {
        let err = parse(
            r#"<rpc message-id="1"><lock><target><candidate/></target></lock></rpc>"#,
            &catalog(),
        )
        .unwrap_err();
        assert!(matches!(err, CoreError::TargetNotRunning));

        let err = parse(r#"<rpc message-id="1"><unlock/></rpc>"#, &catalog()).unwrap_err();
        assert_eq!(err.to_string(), "target store unspecified");
    }

    #[test]
    fn unknown_operation() {
        let err = parse(r#"<rpc message-id="1"><kill-session/></rpc>"#, &catalog()).unwrap_err();
        assert!(matches!(err, CoreError::Unsupported { ref operation } if operation == "kill-session"));
        assert_eq!(err.to_string(), "Unsupported command");
    }

    #[test]
    fn edit_errors_are_deferred() {
        let request = parse(
            r#"<rpc message-id="1"><edit-config><target><startup/></target><config/></edit-config></rpc>"#,
            &catalog(),
        )
        .unwrap();
        assert!(matches!(
            request.rpc,
            Rpc::EditConfig {
                edits: Err(CoreError::TargetNotRunning)
            }
        ));
    }
}
