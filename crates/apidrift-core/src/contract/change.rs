//! Diff result types.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Category tag of a single change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChangeType {
    /// An interface disappeared.
    RemovedInterface,
    /// A named type disappeared.
    RemovedType,
    /// A function disappeared.
    RemovedFunction,
    /// A variable disappeared.
    RemovedVariable,
    /// A constant disappeared.
    RemovedConstant,
    /// A method disappeared from an interface or type.
    RemovedMethod,
    /// A struct field disappeared.
    RemovedField,
    /// An embedded interface disappeared from an interface.
    RemovedEmbeddedInterface,
    /// Method parameters, results, or receiver form changed.
    ChangedMethodSignature,
    /// A type switched between struct, basic, and alias.
    ChangedTypeKind,
    /// Generic type parameters of a type changed.
    ChangedTypeParameters,
    /// A struct field's type changed.
    ChangedFieldType,
    /// An alias-kind type now points at a different target.
    ChangedTypeUnderlying,
    /// Function parameters, results, or type parameters changed.
    ChangedFunctionSignature,
    /// A variable's type changed.
    ChangedVariableType,
    /// A constant's type changed.
    ChangedConstantType,
    /// New interface.
    Interface,
    /// New named type.
    Type,
    /// New function.
    Function,
    /// New variable.
    Variable,
    /// New constant.
    Constant,
    /// New method.
    Method,
    /// New struct field.
    Field,
    /// New embedded interface.
    EmbeddedInterface,
    /// A method's doc comment changed.
    MethodComment,
    /// A struct tag changed.
    FieldTag,
    /// A constant's value changed.
    ConstantValue,
}

impl ChangeType {
    /// The serialized tag, e.g. `removed_method`.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::RemovedInterface => "removed_interface",
            Self::RemovedType => "removed_type",
            Self::RemovedFunction => "removed_function",
            Self::RemovedVariable => "removed_variable",
            Self::RemovedConstant => "removed_constant",
            Self::RemovedMethod => "removed_method",
            Self::RemovedField => "removed_field",
            Self::RemovedEmbeddedInterface => "removed_embedded_interface",
            Self::ChangedMethodSignature => "changed_method_signature",
            Self::ChangedTypeKind => "changed_type_kind",
            Self::ChangedTypeParameters => "changed_type_parameters",
            Self::ChangedFieldType => "changed_field_type",
            Self::ChangedTypeUnderlying => "changed_type_underlying",
            Self::ChangedFunctionSignature => "changed_function_signature",
            Self::ChangedVariableType => "changed_variable_type",
            Self::ChangedConstantType => "changed_constant_type",
            Self::Interface => "interface",
            Self::Type => "type",
            Self::Function => "function",
            Self::Variable => "variable",
            Self::Constant => "constant",
            Self::Method => "method",
            Self::Field => "field",
            Self::EmbeddedInterface => "embedded_interface",
            Self::MethodComment => "method_comment",
            Self::FieldTag => "field_tag",
            Self::ConstantValue => "constant_value",
        }
    }
}

impl fmt::Display for ChangeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One classified change. Breaking changes, additions, and modifications all
/// share this shape; which list a change sits in decides its class.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Change {
    /// Category tag.
    #[serde(rename = "type")]
    pub change_type: ChangeType,
    /// Dotted path of the affected element, e.g. `Writer.Write`.
    pub item: String,
    /// Human-readable summary.
    pub description: String,
    /// Canonical text before the change.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub old_value: Option<String>,
    /// Canonical text after the change.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub new_value: Option<String>,
}

/// Counts over a [`ContractDiff`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiffSummary {
    /// Number of breaking changes.
    pub total_breaking_changes: usize,
    /// Number of additions.
    pub total_additions: usize,
    /// Number of non-breaking modifications.
    pub total_modifications: usize,
    /// `total_breaking_changes > 0`.
    pub has_breaking_changes: bool,
}

/// Result of comparing two contracts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContractDiff {
    /// Package the contracts describe (taken from the newer contract).
    pub package_name: String,
    /// Version label of the baseline.
    #[serde(default)]
    pub old_version: String,
    /// Version label of the candidate.
    #[serde(default)]
    pub new_version: String,
    /// Incompatible changes.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub breaking_changes: Vec<Change>,
    /// New API elements.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub added_items: Vec<Change>,
    /// Notable but compatible changes.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub modified_items: Vec<Change>,
    /// Counts, computed once when the diff is finished.
    pub summary: DiffSummary,
}

impl ContractDiff {
    /// Whether nothing at all changed.
    pub fn is_empty(&self) -> bool {
        self.breaking_changes.is_empty() && self.added_items.is_empty() && self.modified_items.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn change_type_serializes_as_tag() {
        let json = serde_json::to_string(&ChangeType::RemovedEmbeddedInterface).unwrap();
        assert_eq!(json, "\"removed_embedded_interface\"");
        assert_eq!(ChangeType::ChangedFieldType.to_string(), "changed_field_type");
    }

    #[test]
    fn empty_lists_are_omitted() {
        let diff = ContractDiff {
            package_name: "demo".into(),
            old_version: "v1".into(),
            new_version: "v2".into(),
            breaking_changes: Vec::new(),
            added_items: Vec::new(),
            modified_items: Vec::new(),
            summary: DiffSummary::default(),
        };
        let json = serde_json::to_string(&diff).unwrap();
        assert!(!json.contains("\"breaking_changes\""));
        assert!(!json.contains("\"added_items\""));
        assert!(!json.contains("\"modified_items\""));
        assert!(json.contains("\"total_breaking_changes\":0"));
        assert!(json.contains("\"has_breaking_changes\":false"));
        assert!(diff.is_empty());
    }
}
