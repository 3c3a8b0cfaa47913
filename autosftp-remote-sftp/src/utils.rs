use autosftp_core::{RemoteError, RemoteErrorKind, SyncError};
use russh_sftp::client::error::Error;
use russh_sftp::protocol::StatusCode;

/// Classifies an SFTP failure for the sync engine.
pub(crate) fn to_remote_error(context: &str, err: Error) -> RemoteError {
    let kind = match &err {
        Error::Status(status) => match status.status_code {
            StatusCode::NoSuchFile => RemoteErrorKind::NotFound,
            StatusCode::PermissionDenied => RemoteErrorKind::PermissionDenied,
            _ => RemoteErrorKind::Other,
        },
        _ => RemoteErrorKind::Other,
    };
    RemoteError::new(kind, format!("{context}: {err}"))
}

/// A write or flush on a remote file handle failed mid-upload.
pub(crate) fn stream_error(remote: &str, err: std::io::Error) -> SyncError {
    SyncError::RemoteIo(RemoteError::other(format!("put {remote}: {err}")))
}

pub(crate) fn is_no_such_file(err: &Error) -> bool {
    matches!(err, Error::Status(status) if status.status_code == StatusCode::NoSuchFile)
}

pub(crate) fn is_failure(err: &Error) -> bool {
    matches!(err, Error::Status(status) if status.status_code == StatusCode::Failure)
}
