//! Diagnostic message types and related structures.

use rowan::TextRange;

/// Severity level of a diagnostic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Severity {
    #[default]
    Error,
    Warning,
    Info,
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Severity::Error => write!(f, "error"),
            Severity::Warning => write!(f, "warning"),
            Severity::Info => write!(f, "info"),
        }
    }
}

/// Stable, filterable diagnostic codes, grouped by the pipeline stage that
/// raises them (see the error handling design).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DiagnosticCode {
    LexUnterminatedString,
    LexUnterminatedComment,
    LexBadNumber,
    LexUnrecognized,

    ParseUnexpectedToken,
    ParseMissingBlock,

    ImportFileNotFound,
    ImportCycle,

    NameUnknownIdentifier,
    NameAmbiguousWildcard,
    NameRedeclaration,

    TypeWrongKindReference,
    TypePercentOutsideIngredients,

    CompositionCycle,
    CompositionMissingBound,

    SemanticMissingCost,
    SemanticMissingBatchSize,

    SolverInfeasible,
    SolverBackendFailure,
}

impl DiagnosticCode {
    /// Stable string identifier suitable for tooling to filter/suppress by.
    pub fn as_str(self) -> &'static str {
        use DiagnosticCode::*;
        match self {
            LexUnterminatedString => "E-LEX-001",
            LexUnterminatedComment => "E-LEX-002",
            LexBadNumber => "E-LEX-003",
            LexUnrecognized => "E-LEX-004",
            ParseUnexpectedToken => "E-PARSE-001",
            ParseMissingBlock => "E-PARSE-002",
            ImportFileNotFound => "E-IMPORT-001",
            ImportCycle => "E-IMPORT-002",
            NameUnknownIdentifier => "E-NAME-001",
            NameAmbiguousWildcard => "E-NAME-002",
            NameRedeclaration => "E-NAME-003",
            TypeWrongKindReference => "E-TYPE-001",
            TypePercentOutsideIngredients => "E-TYPE-002",
            CompositionCycle => "E-COMP-001",
            CompositionMissingBound => "W-COMP-002",
            SemanticMissingCost => "E-SEM-001",
            SemanticMissingBatchSize => "E-SEM-002",
            SolverInfeasible => "W-SOLVE-001",
            SolverBackendFailure => "E-SOLVE-002",
        }
    }
}

impl std::fmt::Display for DiagnosticCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A suggested fix for a diagnostic.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Fix {
    pub(crate) replacement: String,
    pub(crate) description: String,
}

impl Fix {
    pub fn new(replacement: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            replacement: replacement.into(),
            description: description.into(),
        }
    }
}

/// Related location information for a diagnostic.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RelatedInfo {
    pub(crate) range: TextRange,
    pub(crate) message: String,
}

impl RelatedInfo {
    pub fn new(range: TextRange, message: impl Into<String>) -> Self {
        Self {
            range,
            message: message.into(),
        }
    }
}

/// A single diagnostic: location, message, severity, stable code, and an
/// optional fix/related-location set.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Diagnostic {
    pub severity: Severity,
    pub code: DiagnosticCode,
    pub range: TextRange,
    pub message: String,
    pub(crate) fix: Option<Fix>,
    pub(crate) related: Vec<RelatedInfo>,
}

impl Diagnostic {
    pub(crate) fn new(
        severity: Severity,
        code: DiagnosticCode,
        range: TextRange,
        message: impl Into<String>,
    ) -> Self {
        Self {
            severity,
            code,
            range,
            message: message.into(),
            fix: None,
            related: Vec::new(),
        }
    }

    pub fn is_error(&self) -> bool {
        self.severity == Severity::Error
    }
}

impl std::fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} [{}] at {}..{}: {}",
            self.severity,
            self.code,
            u32::from(self.range.start()),
            u32::from(self.range.end()),
            self.message
        )?;
        if let Some(fix) = &self.fix {
            write!(f, " (fix: {})", fix.description)?;
        }
        for related in &self.related {
            write!(
                f,
                " (related: {} at {}..{})",
                related.message,
                u32::from(related.range.start()),
                u32::from(related.range.end())
            )?;
        }
        Ok(())
    }
}
