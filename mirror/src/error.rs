use std::error;
use std::fmt;

/// Convenient result type for mirror operations using [`MirrorError`] as the
/// error type.
pub type MirrorResult<T> = Result<T, MirrorError>;

/// Main error type for mirror operations.
///
/// [`MirrorError`] can represent single errors, errors with additional
/// detail, or multiple aggregated errors, while exposing a uniform
/// [`ErrorKind`] based interface for classification.
#[derive(Debug, Clone)]
pub struct MirrorError {
    repr: ErrorRepr,
}

/// Internal representation of error data.
#[derive(Debug, Clone)]
enum ErrorRepr {
    /// Error with kind and static description
    WithDescription(ErrorKind, &'static str),
    /// Error with kind, static description, and dynamic detail
    WithDescriptionAndDetail(ErrorKind, &'static str, String),
    /// Multiple aggregated errors
    Many(Vec<MirrorError>),
}

/// Specific categories of errors that can occur while dumping.
///
/// The kinds are organised by functional area so that callers can decide
/// between fatal and non-fatal handling without string matching.
#[derive(PartialEq, Eq, Copy, Clone, Debug)]
#[non_exhaustive]
pub enum ErrorKind {
    // Connection errors
    ConnectionFailed,
    OperationTimedOut,

    // Query and row errors
    QueryFailed,
    ScanFailed,
    InvalidCellValue,

    // Anonymisation rule errors
    RuleCompilationFailed,
    RuleEvaluationFailed,

    // Write side errors
    DumpWriteFailed,

    // Configuration and setup errors
    ConfigError,
    DriverNotFound,

    // General errors
    ConversionError,
    IoError,
    Unknown,
}

impl MirrorError {
    /// Creates a [`MirrorError`] containing multiple aggregated errors.
    pub fn many(errors: Vec<MirrorError>) -> MirrorError {
        MirrorError {
            repr: ErrorRepr::Many(errors),
        }
    }

    /// Returns the [`ErrorKind`] of this error.
    ///
    /// For multiple errors, returns the kind of the first error or
    /// [`ErrorKind::Unknown`] if the error list is empty.
    pub fn kind(&self) -> ErrorKind {
        match self.repr {
            ErrorRepr::WithDescription(kind, _)
            | ErrorRepr::WithDescriptionAndDetail(kind, _, _) => kind,
            ErrorRepr::Many(ref errors) => errors
                .first()
                .map(|err| err.kind())
                .unwrap_or(ErrorKind::Unknown),
        }
    }

    /// Returns all [`ErrorKind`]s present in this error.
    pub fn kinds(&self) -> Vec<ErrorKind> {
        match self.repr {
            ErrorRepr::WithDescription(kind, _)
            | ErrorRepr::WithDescriptionAndDetail(kind, _, _) => vec![kind],
            ErrorRepr::Many(ref errors) => {
                errors.iter().flat_map(|err| err.kinds()).collect::<Vec<_>>()
            }
        }
    }

    /// Returns the detailed error information if available.
    pub fn detail(&self) -> Option<&str> {
        match self.repr {
            ErrorRepr::WithDescriptionAndDetail(_, _, ref detail) => Some(detail.as_str()),
            ErrorRepr::Many(ref errors) => errors.iter().find_map(|err| err.detail()),
            _ => None,
        }
    }
}

impl PartialEq for MirrorError {
    fn eq(&self, other: &MirrorError) -> bool {
        match (&self.repr, &other.repr) {
            (ErrorRepr::WithDescription(kind_a, _), ErrorRepr::WithDescription(kind_b, _)) => {
                kind_a == kind_b
            }
            (
                ErrorRepr::WithDescriptionAndDetail(kind_a, _, _),
                ErrorRepr::WithDescriptionAndDetail(kind_b, _, _),
            ) => kind_a == kind_b,
            (ErrorRepr::Many(errors_a), ErrorRepr::Many(errors_b)) => {
                errors_a.len() == errors_b.len()
                    && errors_a.iter().zip(errors_b.iter()).all(|(a, b)| a == b)
            }
            _ => false,
        }
    }
}

impl fmt::Display for MirrorError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> Result<(), fmt::Error> {
        match self.repr {
            ErrorRepr::WithDescription(kind, desc) => {
                fmt::Debug::fmt(&kind, f)?;
                f.write_str(": ")?;
                desc.fmt(f)?;

                Ok(())
            }
            ErrorRepr::WithDescriptionAndDetail(kind, desc, ref detail) => {
                fmt::Debug::fmt(&kind, f)?;
                f.write_str(": ")?;
                desc.fmt(f)?;
                f.write_str(" -> ")?;
                detail.fmt(f)?;

                Ok(())
            }
            ErrorRepr::Many(ref errors) => {
                if errors.is_empty() {
                    write!(f, "Multiple errors occurred (empty)")?;
                } else if errors.len() == 1 {
                    errors[0].fmt(f)?;
                } else {
                    write!(f, "Multiple errors occurred ({} total):", errors.len())?;
                    for (i, error) in errors.iter().enumerate() {
                        write!(f, "\n  {}: {}", i + 1, error)?;
                    }
                }
                Ok(())
            }
        }
    }
}

impl error::Error for MirrorError {}

/// Creates a [`MirrorError`] from an error kind and static description.
impl From<(ErrorKind, &'static str)> for MirrorError {
    fn from((kind, desc): (ErrorKind, &'static str)) -> MirrorError {
        MirrorError {
            repr: ErrorRepr::WithDescription(kind, desc),
        }
    }
}

/// Creates a [`MirrorError`] from an error kind, static description, and
/// dynamic detail.
impl From<(ErrorKind, &'static str, String)> for MirrorError {
    fn from((kind, desc, detail): (ErrorKind, &'static str, String)) -> MirrorError {
        MirrorError {
            repr: ErrorRepr::WithDescriptionAndDetail(kind, desc, detail),
        }
    }
}

/// Creates a [`MirrorError`] from a vector of errors for aggregation.
impl<E> From<Vec<E>> for MirrorError
where
    E: Into<MirrorError>,
{
    fn from(errors: Vec<E>) -> MirrorError {
        MirrorError {
            repr: ErrorRepr::Many(errors.into_iter().map(Into::into).collect()),
        }
    }
}

/// Converts [`std::io::Error`] to [`MirrorError`] with [`ErrorKind::IoError`].
impl From<std::io::Error> for MirrorError {
    fn from(err: std::io::Error) -> MirrorError {
        MirrorError {
            repr: ErrorRepr::WithDescriptionAndDetail(
                ErrorKind::IoError,
                "I/O error occurred",
                err.to_string(),
            ),
        }
    }
}

/// Converts [`std::str::Utf8Error`] to [`MirrorError`] with
/// [`ErrorKind::ConversionError`].
impl From<std::str::Utf8Error> for MirrorError {
    fn from(err: std::str::Utf8Error) -> MirrorError {
        MirrorError {
            repr: ErrorRepr::WithDescriptionAndDetail(
                ErrorKind::ConversionError,
                "UTF-8 conversion failed",
                err.to_string(),
            ),
        }
    }
}

/// Converts [`std::string::FromUtf8Error`] to [`MirrorError`] with
/// [`ErrorKind::ConversionError`].
impl From<std::string::FromUtf8Error> for MirrorError {
    fn from(err: std::string::FromUtf8Error) -> MirrorError {
        MirrorError {
            repr: ErrorRepr::WithDescriptionAndDetail(
                ErrorKind::ConversionError,
                "UTF-8 string conversion failed",
                err.to_string(),
            ),
        }
    }
}

/// Converts [`serde_json::Error`] to [`MirrorError`] with an appropriate
/// error kind.
impl From<serde_json::Error> for MirrorError {
    fn from(err: serde_json::Error) -> MirrorError {
        let (kind, description) = match err.classify() {
            serde_json::error::Category::Io => (ErrorKind::IoError, "JSON I/O operation failed"),
            _ => (ErrorKind::ConversionError, "JSON conversion failed"),
        };

        MirrorError {
            repr: ErrorRepr::WithDescriptionAndDetail(kind, description, err.to_string()),
        }
    }
}

/// Converts [`mysql_async::Error`] to [`MirrorError`] with an appropriate
/// error kind.
///
/// Server side errors map to [`ErrorKind::QueryFailed`], transport and driver
/// errors to [`ErrorKind::ConnectionFailed`], and malformed connection URLs
/// to [`ErrorKind::ConfigError`].
impl From<mysql_async::Error> for MirrorError {
    fn from(err: mysql_async::Error) -> MirrorError {
        let (kind, description) = match &err {
            mysql_async::Error::Server(_) => (ErrorKind::QueryFailed, "MySQL server error"),
            mysql_async::Error::Io(_) => (ErrorKind::ConnectionFailed, "MySQL connection error"),
            mysql_async::Error::Driver(_) => (ErrorKind::ConnectionFailed, "MySQL driver error"),
            mysql_async::Error::Url(_) => (ErrorKind::ConfigError, "invalid MySQL DSN"),
            _ => (ErrorKind::Unknown, "MySQL error"),
        };

        MirrorError {
            repr: ErrorRepr::WithDescriptionAndDetail(kind, description, err.to_string()),
        }
    }
}

/// Converts [`config::ConfigError`] to [`MirrorError`] with
/// [`ErrorKind::ConfigError`].
impl From<config::ConfigError> for MirrorError {
    fn from(err: config::ConfigError) -> MirrorError {
        MirrorError {
            repr: ErrorRepr::WithDescriptionAndDetail(
                ErrorKind::ConfigError,
                "configuration loading failed",
                err.to_string(),
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{bail, mirror_error};

    #[test]
    fn test_simple_error_creation() {
        let err = MirrorError::from((ErrorKind::ConnectionFailed, "Database connection failed"));
        assert_eq!(err.kind(), ErrorKind::ConnectionFailed);
        assert_eq!(err.detail(), None);
        assert_eq!(err.kinds(), vec![ErrorKind::ConnectionFailed]);
    }

    #[test]
    fn test_error_with_detail() {
        let err = MirrorError::from((
            ErrorKind::QueryFailed,
            "SQL query execution failed",
            "Table 'users' doesn't exist".to_string(),
        ));
        assert_eq!(err.kind(), ErrorKind::QueryFailed);
        assert_eq!(err.detail(), Some("Table 'users' doesn't exist"));
        assert_eq!(err.kinds(), vec![ErrorKind::QueryFailed]);
    }

    #[test]
    fn test_multiple_errors() {
        let errors = vec![
            MirrorError::from((ErrorKind::ConfigError, "Invalid spec")),
            MirrorError::from((ErrorKind::ConversionError, "Type mismatch")),
            MirrorError::from((ErrorKind::IoError, "Connection timeout")),
        ];
        let multi_err = MirrorError::many(errors);

        assert_eq!(multi_err.kind(), ErrorKind::ConfigError);
        assert_eq!(
            multi_err.kinds(),
            vec![
                ErrorKind::ConfigError,
                ErrorKind::ConversionError,
                ErrorKind::IoError
            ]
        );
        assert_eq!(multi_err.detail(), None);
    }

    #[test]
    fn test_multiple_errors_with_detail() {
        let errors = vec![
            MirrorError::from((
                ErrorKind::ConfigError,
                "Invalid spec",
                "Missing required field".to_string(),
            )),
            MirrorError::from((ErrorKind::ConversionError, "Type mismatch")),
        ];
        let multi_err = MirrorError::many(errors);

        assert_eq!(multi_err.detail(), Some("Missing required field"));
    }

    #[test]
    fn test_empty_multiple_errors() {
        let multi_err = MirrorError::many(vec![]);
        assert_eq!(multi_err.kind(), ErrorKind::Unknown);
        assert_eq!(multi_err.kinds(), vec![]);
        assert_eq!(multi_err.detail(), None);
    }

    #[test]
    fn test_error_equality() {
        let err1 = MirrorError::from((ErrorKind::ConnectionFailed, "Connection failed"));
        let err2 = MirrorError::from((ErrorKind::ConnectionFailed, "Connection failed"));
        let err3 = MirrorError::from((ErrorKind::QueryFailed, "Query failed"));

        assert_eq!(err1, err2);
        assert_ne!(err1, err3);
    }

    #[test]
    fn test_error_display() {
        let err = MirrorError::from((ErrorKind::ConnectionFailed, "Database connection failed"));
        let display_str = format!("{err}");
        assert!(display_str.contains("ConnectionFailed"));
        assert!(display_str.contains("Database connection failed"));
    }

    #[test]
    fn test_error_display_with_detail() {
        let err = MirrorError::from((
            ErrorKind::QueryFailed,
            "SQL query failed",
            "Invalid table name".to_string(),
        ));
        let display_str = format!("{err}");
        assert!(display_str.contains("QueryFailed"));
        assert!(display_str.contains("SQL query failed"));
        assert!(display_str.contains("Invalid table name"));
    }

    #[test]
    fn test_multiple_errors_display() {
        let errors = vec![
            MirrorError::from((ErrorKind::ConfigError, "Invalid spec")),
            MirrorError::from((ErrorKind::ConversionError, "Type mismatch")),
        ];
        let multi_err = MirrorError::many(errors);
        let display_str = format!("{multi_err}");
        assert!(display_str.contains("Multiple errors"));
        assert!(display_str.contains("2 total"));
    }

    #[test]
    fn test_macro_usage() {
        let err = mirror_error!(ErrorKind::ConfigError, "Invalid data format");
        assert_eq!(err.kind(), ErrorKind::ConfigError);
        assert_eq!(err.detail(), None);

        let err_with_detail = mirror_error!(
            ErrorKind::ConversionError,
            "Type conversion failed",
            "Cannot convert string to integer: 'abc'"
        );
        assert_eq!(err_with_detail.kind(), ErrorKind::ConversionError);
        assert!(err_with_detail.detail().unwrap().contains("Cannot convert"));
    }

    #[test]
    fn test_bail_macro() {
        fn test_function() -> MirrorResult<i32> {
            bail!(ErrorKind::ConfigError, "Test error");
        }

        fn test_function_with_detail() -> MirrorResult<i32> {
            bail!(
                ErrorKind::ConversionError,
                "Test error",
                "Additional detail"
            );
        }

        let result = test_function();
        assert!(result.is_err());
        let err = result.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ConfigError);

        let result = test_function_with_detail();
        assert!(result.is_err());
        let err = result.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ConversionError);
        assert!(err.detail().unwrap().contains("Additional detail"));
    }

    #[test]
    fn test_nested_multiple_errors() {
        let inner_errors = vec![
            MirrorError::from((ErrorKind::ConversionError, "Inner error 1")),
            MirrorError::from((ErrorKind::ConfigError, "Inner error 2")),
        ];
        let inner_multi = MirrorError::many(inner_errors);

        let outer_errors = vec![
            inner_multi,
            MirrorError::from((ErrorKind::IoError, "Outer error")),
        ];
        let outer_multi = MirrorError::many(outer_errors);

        let kinds = outer_multi.kinds();
        assert_eq!(kinds.len(), 3);
        assert!(kinds.contains(&ErrorKind::ConversionError));
        assert!(kinds.contains(&ErrorKind::ConfigError));
        assert!(kinds.contains(&ErrorKind::IoError));
    }
}
