use crate::models::document::DocumentKind;
use crate::models::user::Identity;

/// Object key for a document: `<kind namespace>/<uid>/<file name>`.
///
/// Keys are deterministic, so re-uploading a same-named file overwrites the
/// user's previous copy and never touches another user's namespace.
pub fn destination_path(identity: &Identity, kind: DocumentKind, file_name: &str) -> String {
    format!("{}/{}/{}", kind.namespace(), identity.uid, base_name(file_name))
}

/// Final path component of a client-supplied file name.
pub fn base_name(file_name: &str) -> &str {
    file_name
        .rsplit(|c| c == '/' || c == '\\')
        .next()
        .unwrap_or(file_name)
}
