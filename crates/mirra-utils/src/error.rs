use std::{error::Error, fmt};

#[derive(Debug)]
pub enum PathError {
    CurrentDir { source: std::io::Error },

    Empty,

    MissingEnvVar { var: String, input: String },

    UnclosedVariable { input: String },
}

impl fmt::Display for PathError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PathError::Empty => write!(f, "Path is empty"),
            PathError::CurrentDir { source } => {
                write!(f, "Failed to get current directory: {source}")
            }
            PathError::UnclosedVariable { input } => {
                write!(f, "Unclosed variable expression starting at `{input}`")
            }
            PathError::MissingEnvVar { var, input } => {
                write!(f, "Environment variable `{var}` not set in `{input}`")
            }
        }
    }
}

impl Error for PathError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            PathError::CurrentDir { source } => Some(source),
            _ => None,
        }
    }
}

#[derive(Debug)]
pub enum NameError {
    Empty,

    TooLong { name: String },

    InvalidCharacter { name: String, found: char },

    MalformedScope { name: String },
}

impl fmt::Display for NameError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NameError::Empty => write!(f, "Package name is empty"),
            NameError::TooLong { name } => {
                write!(f, "Package name `{name}` exceeds 214 characters")
            }
            NameError::InvalidCharacter { name, found } => {
                write!(f, "Package name `{name}` contains invalid character `{found}`")
            }
            NameError::MalformedScope { name } => {
                write!(f, "Scoped package name `{name}` must look like `@scope/name`")
            }
        }
    }
}

impl Error for NameError {}

pub type NameResult<T> = std::result::Result<T, NameError>;
pub type PathResult<T> = std::result::Result<T, PathError>;
