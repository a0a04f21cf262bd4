//! Diagnostics
//!
//! Collects data-quality findings during graph building and traversal.
//! Nothing here aborts a query: the offending edge is skipped and the
//! finding is returned next to the best-effort result.

use serde::{Deserialize, Serialize};
use std::fmt;

// =============================================================================
// Diagnostic Codes
// =============================================================================

/// Diagnostic code for categorizing issues
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DiagnosticCode {
    // === Declarations ===
    /// Declaration whose subject resolves to the declarer
    SelfRelation,
    /// Subject (or intermediate) id has no person record
    UnknownPerson,
    /// Subject not yet registered as a person
    PendingSubject,
    /// grandparent/grandchild declared without an intermediate relative
    UnanchoredDeclaration,
    /// Parent edge whose reverse was already declared
    ContradictoryEdge,

    // === Unions ===
    /// Declarer has several unions and none matches the child's other parent
    AmbiguousUnion,

    // === Structure ===
    /// Cycle among parent/child edges
    ParentCycle,

    // === Queries ===
    /// Requested depth was outside [1, 10] and was clamped
    DepthClamped,
}

impl DiagnosticCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::SelfRelation => "W001",
            Self::UnknownPerson => "W002",
            Self::PendingSubject => "I001",
            Self::UnanchoredDeclaration => "I002",
            Self::ContradictoryEdge => "W003",
            Self::AmbiguousUnion => "I003",
            Self::ParentCycle => "W004",
            Self::DepthClamped => "I004",
        }
    }

    pub fn severity(&self) -> Severity {
        match self {
            Self::SelfRelation
            | Self::UnknownPerson
            | Self::ContradictoryEdge
            | Self::ParentCycle => Severity::Warning,

            Self::PendingSubject
            | Self::UnanchoredDeclaration
            | Self::AmbiguousUnion
            | Self::DepthClamped => Severity::Info,
        }
    }
}

impl fmt::Display for DiagnosticCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

// =============================================================================
// Severity
// =============================================================================

/// Diagnostic severity level
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Info,
    Warning,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Info => write!(f, "info"),
            Self::Warning => write!(f, "warning"),
        }
    }
}

// =============================================================================
// Diagnostic Item
// =============================================================================

/// A single diagnostic item
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DiagnosticItem {
    /// Declaration or person the finding is about
    pub subject: String,
    pub code: DiagnosticCode,
    pub message: String,
    /// Related ids (cycle members, candidate unions)
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub context: Vec<String>,
}

impl DiagnosticItem {
    pub fn new(subject: impl Into<String>, code: DiagnosticCode, message: impl Into<String>) -> Self {
        Self {
            subject: subject.into(),
            code,
            message: message.into(),
            context: Vec::new(),
        }
    }

    pub fn with_context(mut self, ctx: impl Into<String>) -> Self {
        self.context.push(ctx.into());
        self
    }

    pub fn severity(&self) -> Severity {
        self.code.severity()
    }
}

impl fmt::Display for DiagnosticItem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "[{}] {}: {} ({})",
            self.code,
            self.code.severity(),
            self.message,
            self.subject
        )?;

        for ctx in &self.context {
            write!(f, "\n  - {}", ctx)?;
        }

        Ok(())
    }
}

// =============================================================================
// Diagnostics Collection
// =============================================================================

/// Collection of diagnostics from a build or traversal
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Diagnostics {
    items: Vec<DiagnosticItem>,
}

impl Diagnostics {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a diagnostic item, logging warnings as they are found
    pub fn push(&mut self, item: DiagnosticItem) {
        match item.severity() {
            Severity::Warning => tracing::warn!(code = %item.code, subject = %item.subject, "{}", item.message),
            Severity::Info => tracing::debug!(code = %item.code, subject = %item.subject, "{}", item.message),
        }
        self.items.push(item);
    }

    pub fn report(&mut self, subject: impl Into<String>, code: DiagnosticCode, message: impl Into<String>) {
        self.push(DiagnosticItem::new(subject, code, message));
    }

    pub fn extend(&mut self, other: impl IntoIterator<Item = DiagnosticItem>) {
        for item in other {
            self.push(item);
        }
    }

    pub fn items(&self) -> &[DiagnosticItem] {
        &self.items
    }

    pub fn iter(&self) -> impl Iterator<Item = &DiagnosticItem> {
        self.items.iter()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn has_code(&self, code: DiagnosticCode) -> bool {
        self.items.iter().any(|i| i.code == code)
    }

    pub fn count(&self, code: DiagnosticCode) -> usize {
        self.items.iter().filter(|i| i.code == code).count()
    }

    pub fn warnings(&self) -> impl Iterator<Item = &DiagnosticItem> {
        self.items.iter().filter(|i| i.severity() == Severity::Warning)
    }
}

impl fmt::Display for Diagnostics {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for item in &self.items {
            writeln!(f, "{}", item)?;
        }
        Ok(())
    }
}
