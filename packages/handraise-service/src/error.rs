pub type Result<T, E = Error> = std::result::Result<T, E>;

const UNIQUE_VIOLATION: &str = "23505";

#[derive(Debug, thiserror::Error)]
pub enum Error {
	#[error("Invalid request: {message}")]
	InvalidRequest { message: String },
	#[error("Forbidden: {message}")]
	Forbidden { message: String },
	#[error("Not found: {message}")]
	NotFound { message: String },
	#[error("Conflict: {message}")]
	Conflict { message: String },
	#[error("Unauthorized: {message}")]
	Unauthorized { message: String },
	#[error("Provider error: {message}")]
	Provider { message: String },
	#[error("Storage error: {message}")]
	Storage { message: String },
	#[error("Password hashing failed: {message}")]
	PasswordHash { message: String },
}
impl From<sqlx::Error> for Error {
	fn from(err: sqlx::Error) -> Self {
		if let Some(db_err) = err.as_database_error()
			&& db_err.code().as_deref() == Some(UNIQUE_VIOLATION)
		{
			return Self::Conflict { message: "Resource already exists.".to_string() };
		}

		Self::Storage { message: err.to_string() }
	}
}

impl From<handraise_storage::Error> for Error {
	fn from(err: handraise_storage::Error) -> Self {
		match err {
			handraise_storage::Error::Sqlx(inner) => Self::from(inner),
			handraise_storage::Error::InvalidArgument(message) => Self::InvalidRequest { message },
			handraise_storage::Error::NotFound(message) => Self::NotFound { message },
		}
	}
}

impl From<handraise_providers::Error> for Error {
	fn from(err: handraise_providers::Error) -> Self {
		Self::Provider { message: err.to_string() }
	}
}
