//! Error handling for the ReadStore CLI

use std::path::PathBuf;
use thiserror::Error;

/// Main error type for ReadStore CLI operations
#[derive(Error, Debug)]
pub enum CliError {
    #[error("Configuration error: {message}")]
    Config { message: String },

    #[error("File not found: {path}")]
    FileNotFound { path: PathBuf },

    #[error("Parsing error in {file} line {line}: {message}")]
    Parse { file: String, line: usize, message: String },

    #[error("Unknown chromosome '{name}' in {file}")]
    UnknownChromosome { file: String, name: String },

    #[error("Validation error: {message}")]
    Validation { message: String },
}

impl CliError {
    pub fn config<S: Into<String>>(message: S) -> Self {
        Self::Config { message: message.into() }
    }

    pub fn file_not_found(path: PathBuf) -> Self {
        Self::FileNotFound { path }
    }

    pub fn parse<S: Into<String>>(file: S, line: usize, message: S) -> Self {
        Self::Parse { file: file.into(), line, message: message.into() }
    }

    pub fn unknown_chromosome<S: Into<String>>(file: S, name: S) -> Self {
        Self::UnknownChromosome { file: file.into(), name: name.into() }
    }

    pub fn validation<S: Into<String>>(message: S) -> Self {
        Self::Validation { message: message.into() }
    }
}

impl From<toml::de::Error> for CliError {
    fn from(err: toml::de::Error) -> Self {
        Self::config(format!("TOML parsing error: {}", err))
    }
}

impl From<toml::ser::Error> for CliError {
    fn from(err: toml::ser::Error) -> Self {
        Self::config(format!("TOML serialization error: {}", err))
    }
}

/// Result type for CLI operations
pub type CliResult<T> = Result<T, CliError>;

/// Provide helpful error messages and suggestions
pub fn format_error_with_suggestions(error: &CliError) -> String {
    let mut message = error.to_string();

    match error {
        CliError::FileNotFound { path } => {
            message.push_str(&format!(
                "\n\nSuggestions:\n\
                 • Check that the file path is correct: {}\n\
                 • Ensure you have read permissions for the file",
                path.display()
            ));
        }

        CliError::Parse { .. } => {
            message.push_str(
                "\n\nSuggestions:\n\
                 • Reads are tab separated: chromosome, start, end, strand (+, - or .) and an optional count\n\
                 • Pairs are two reads on one line: eight columns\n\
                 • Lines starting with # are ignored",
            );
        }

        CliError::UnknownChromosome { .. } => {
            message.push_str(
                "\n\nSuggestions:\n\
                 • Check that the genome file lists every chromosome in the input\n\
                 • Chromosome names are case sensitive",
            );
        }

        CliError::Config { .. } => {
            message.push_str(
                "\n\nSuggestions:\n\
                 • Check your readstore.toml configuration file\n\
                 • Use 'readstore config --example' to generate a sample configuration",
            );
        }

        _ => {}
    }

    message
}

/// Print error with helpful suggestions and exit
pub fn print_error_and_exit(error: &CliError) -> ! {
    eprintln!("Error: {}", format_error_with_suggestions(error));
    std::process::exit(1);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_creation() {
        let err = CliError::config("test message");
        assert!(matches!(err, CliError::Config { .. }));
        assert_eq!(err.to_string(), "Configuration error: test message");
    }

    #[test]
    fn test_error_suggestions() {
        let err = CliError::file_not_found(PathBuf::from("reads.tsv"));
        let formatted = format_error_with_suggestions(&err);
        assert!(formatted.contains("Suggestions:"));
        assert!(formatted.contains("Check that the file path is correct"));
    }

    #[test]
    fn test_parse_error_mentions_line() {
        let err = CliError::parse("reads.tsv", 12, "bad start");
        assert_eq!(err.to_string(), "Parsing error in reads.tsv line 12: bad start");
    }
}
