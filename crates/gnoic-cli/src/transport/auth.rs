//! Per-call credential metadata.

use tonic::metadata::{AsciiMetadataValue, MetadataValue};
use tonic::service::Interceptor;
use tonic::{Request, Status};

use crate::error::CliError;

/// Adds `username` and `password` metadata to every outgoing call.
#[derive(Clone, Default)]
pub struct Credentials {
    username: Option<AsciiMetadataValue>,
    password: Option<AsciiMetadataValue>,
}

impl Credentials {
    /// Creates an interceptor for the given credentials.
    ///
    /// # Errors
    ///
    /// Returns [`CliError::Config`] if a value is not valid header text.
    pub fn new(username: Option<&str>, password: Option<&str>) -> Result<Self, CliError> {
        Ok(Self {
            username: username.map(|u| metadata("username", u)).transpose()?,
            password: password.map(|p| metadata("password", p)).transpose()?,
        })
    }
}

fn metadata(field: &str, value: &str) -> Result<AsciiMetadataValue, CliError> {
    MetadataValue::try_from(value)
        .map_err(|_| CliError::config(format!("{field} contains characters not allowed in metadata")))
}

impl Interceptor for Credentials {
    fn call(&mut self, mut request: Request<()>) -> Result<Request<()>, Status> {
        if let Some(username) = &self.username {
            request.metadata_mut().insert("username", username.clone());
        }
        if let Some(password) = &self.password {
            request.metadata_mut().insert("password", password.clone());
        }
        Ok(request)
    }
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &self.password.as_ref().map(|_| "[REDACTED]"))
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn injects_both_headers() {
        let mut creds = Credentials::new(Some("admin"), Some("admin123")).unwrap();
        let request = creds.call(Request::new(())).unwrap();
        assert_eq!(request.metadata().get("username").unwrap(), "admin");
        assert_eq!(request.metadata().get("password").unwrap(), "admin123");
    }

    #[test]
    fn absent_values_are_not_sent() {
        let mut creds = Credentials::new(Some("admin"), None).unwrap();
        let request = creds.call(Request::new(())).unwrap();
        assert!(request.metadata().get("password").is_none());
    }

    #[test]
    fn newline_rejected() {
        assert!(matches!(
            Credentials::new(Some("a\nb"), None),
            Err(CliError::Config(_))
        ));
    }

    #[test]
    fn debug_redacts_password() {
        let creds = Credentials::new(Some("admin"), Some("hunter2")).unwrap();
        assert!(!format!("{creds:?}").contains("hunter2"));
    }
}
