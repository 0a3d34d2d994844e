//! JSON handlers for the changeset endpoints.
//!
//! Framework-free: the HTTP server is an external collaborator, so these
//! handlers take parsed-out request bodies and return a status code plus a
//! `serde_json` body. Mount them however the embedding server routes:
//!
//! | Route | Handler |
//! |---|---|
//! | `POST /_titan/files/versions/changeset` | [`post_changeset`] |
//! | `POST /_titan/files/versions/changeset/commit` | [`post_commit`] |
//!
//! Status mapping: 201 on success, 400 for malformed parameters, 404 for
//! unknown changesets or versions, 500 for store failures.

use serde::Deserialize;

use crate::datastore::Datastore;
use crate::error::{ChangesetError, CommitError, Error};
use crate::model::types::FilePath;
use crate::versions::changeset::Changeset;
use crate::versions::service::VersionControlService;

/// Route of the changeset-allocation endpoint.
pub const CHANGESET_ROUTE: &str = "/_titan/files/versions/changeset";

/// Route of the commit endpoint.
pub const CHANGESET_COMMIT_ROUTE: &str = "/_titan/files/versions/changeset/commit";

// ---------------------------------------------------------------------------
// ApiResponse
// ---------------------------------------------------------------------------

/// A handler's result: HTTP status code plus JSON body.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ApiResponse {
    /// HTTP status code.
    pub status: u16,
    /// JSON response body.
    pub body: serde_json::Value,
}

impl ApiResponse {
    fn created(body: serde_json::Value) -> Self {
        Self { status: 201, body }
    }

    fn bad_request(message: String) -> Self {
        Self {
            status: 400,
            body: serde_json::json!({ "error": message }),
        }
    }
}

fn error_response(error: &Error) -> ApiResponse {
    let status = match error {
        Error::Changeset(ChangesetError::NotFound { .. }) | Error::FileVersion(_) => 404,
        Error::Store(_) | Error::Commit(CommitError::TransactionAborted { .. }) => 500,
        _ => 400,
    };
    ApiResponse {
        status,
        body: serde_json::json!({ "error": error.to_string() }),
    }
}

fn changeset_json(ds: &Datastore, cs: &Changeset) -> Result<serde_json::Value, Error> {
    let record = cs.record(ds)?;
    Ok(serde_json::json!({
        "num": record.num,
        "status": record.status,
        "created": record.created,
        "created_by": record.created_by,
    }))
}

// ---------------------------------------------------------------------------
// POST /_titan/files/versions/changeset
// ---------------------------------------------------------------------------

/// Allocate a new staging changeset.
///
/// Returns 201 with `{num, status, created, created_by}`.
#[must_use]
pub fn post_changeset(vcs: &VersionControlService, created_by: Option<&str>) -> ApiResponse {
    match vcs.new_staging_changeset(created_by.map(str::to_owned)) {
        Ok(cs) => match changeset_json(vcs.datastore(), &cs) {
            Ok(body) => ApiResponse::created(body),
            Err(error) => error_response(&error),
        },
        Err(error) => error_response(&error),
    }
}

// ---------------------------------------------------------------------------
// POST /_titan/files/versions/changeset/commit
// ---------------------------------------------------------------------------

/// Body of a commit request.
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct CommitRequest {
    /// The staging changeset number.
    changeset: u64,
    /// Strong-consistency mode: the full list of written paths.
    #[serde(default)]
    manifest: Option<Vec<String>>,
    /// Eventual-consistency mode: commit from the directory query.
    #[serde(default)]
    force: Option<bool>,
}

/// Commit a staging changeset.
///
/// The body must carry `changeset` and exactly one of `manifest` (a JSON
/// array of paths, committed with strong consistency) or `force: true`
/// (committed from the eventually consistent query). Returns 201 with the
/// final changeset on success.
#[must_use]
pub fn post_commit(vcs: &VersionControlService, body: &str) -> ApiResponse {
    let request: CommitRequest = match serde_json::from_str(body) {
        Ok(request) => request,
        Err(error) => {
            return ApiResponse::bad_request(format!("malformed request body: {error}"));
        }
    };
    let force = request.force.unwrap_or(false);
    if request.manifest.is_some() == force {
        return ApiResponse::bad_request(
            "exactly one of \"manifest\" or \"force\" is required".to_owned(),
        );
    }

    let mut staging = match vcs.changesets().load(request.changeset) {
        Ok(cs) => cs,
        Err(error) => return error_response(&error),
    };

    let result = if let Some(manifest) = request.manifest {
        let mut paths = Vec::with_capacity(manifest.len());
        for raw in manifest {
            match FilePath::new(&raw) {
                Ok(path) => paths.push(path),
                Err(error) => return ApiResponse::bad_request(error.to_string()),
            }
        }
        for path in paths {
            staging.associate_file(path);
        }
        staging.finalize_associated_files();
        vcs.commit(&staging, false)
    } else {
        vcs.commit(&staging, true)
    };

    match result {
        Ok(final_cs) => match changeset_json(vcs.datastore(), &final_cs) {
            Ok(body) => ApiResponse::created(body),
            Err(error) => error_response(&error),
        },
        Err(error) => error_response(&error),
    }
}
