//! Semantic comparison of two contracts.
//!
//! [`Differ::diff`] walks interfaces, types, functions, variables, and
//! constants in that order. Each collection is split by name into removed,
//! added, and common entities; removals are breaking, additions are added
//! items, and common entities are compared structurally. Signatures are
//! compared by their canonical text, which never contains parameter names,
//! so renaming a parameter is never reported.

pub mod setdiff;

use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, instrument};

use crate::contract::{
    Change, ChangeType, Contract, ContractDiff, DiffSummary, FieldContract, MethodContract,
    TypeKind, render_type_params,
};
use setdiff::partition;

/// Which side of a comparison.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Side {
    /// The baseline.
    Old,
    /// The candidate.
    New,
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Old => write!(f, "old"),
            Self::New => write!(f, "new"),
        }
    }
}

/// Errors from [`Differ::compare`].
#[derive(Error, Debug)]
pub enum DiffError {
    /// One of the two contracts was not supplied.
    #[error("{side} contract is missing")]
    MissingContract {
        /// The absent side.
        side: Side,
    },
}

/// Result alias for diffing.
pub type DiffResult<T> = Result<T, DiffError>;

/// Comparison settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DiffOptions {
    /// Positions are never compared; reserved.
    pub ignore_positions: bool,
    /// Suppress `method_comment` modifications.
    pub ignore_comments: bool,
}

impl Default for DiffOptions {
    fn default() -> Self {
        Self {
            ignore_positions: true,
            ignore_comments: false,
        }
    }
}

/// Compares contracts.
#[derive(Debug, Clone, Copy, Default)]
pub struct Differ {
    options: DiffOptions,
}

impl Differ {
    /// Create a differ with the given options.
    pub const fn new(options: DiffOptions) -> Self {
        Self { options }
    }

    /// Compare two optional contracts, failing if either is absent.
    pub fn compare(&self, old: Option<&Contract>, new: Option<&Contract>) -> DiffResult<ContractDiff> {
        let old = old.ok_or(DiffError::MissingContract { side: Side::Old })?;
        let new = new.ok_or(DiffError::MissingContract { side: Side::New })?;
        Ok(self.diff(old, new))
    }

    /// Compare `old` against `new`.
    #[instrument(skip_all, fields(package = %new.package_name, old = %old.version, new = %new.version))]
    pub fn diff(&self, old: &Contract, new: &Contract) -> ContractDiff {
        let mut changes = Changes::default();
        self.interfaces(old, new, &mut changes);
        self.types(old, new, &mut changes);
        functions(old, new, &mut changes);
        variables(old, new, &mut changes);
        constants(old, new, &mut changes);

        let summary = DiffSummary {
            total_breaking_changes: changes.breaking.len(),
            total_additions: changes.added.len(),
            total_modifications: changes.modified.len(),
            has_breaking_changes: !changes.breaking.is_empty(),
        };
        debug!(
            breaking = summary.total_breaking_changes,
            added = summary.total_additions,
            modified = summary.total_modifications,
            "diff complete"
        );

        let package_name = if new.package_name.is_empty() {
            old.package_name.clone()
        } else {
            new.package_name.clone()
        };
        ContractDiff {
            package_name,
            old_version: old.version.clone(),
            new_version: new.version.clone(),
            breaking_changes: changes.breaking,
            added_items: changes.added,
            modified_items: changes.modified,
            summary,
        }
    }

    fn interfaces(&self, old: &Contract, new: &Contract, changes: &mut Changes) {
        let split = partition(&old.interfaces, &new.interfaces);
        for iface in split.removed {
            changes.breaking(
                ChangeType::RemovedInterface,
                &iface.name,
                format!("interface {} was removed", iface.name),
                Some(iface.signature()),
                None,
            );
        }
        for iface in split.added {
            changes.added(
                ChangeType::Interface,
                &iface.name,
                format!("interface {} was added", iface.name),
                iface.signature(),
            );
        }
        for (before, after) in split.common {
            let embeds = partition(&before.embeds, &after.embeds);
            for embed in embeds.removed {
                changes.breaking(
                    ChangeType::RemovedEmbeddedInterface,
                    &format!("{}.{embed}", before.name),
                    format!("{embed} is no longer embedded in interface {}", before.name),
                    Some(embed.clone()),
                    None,
                );
            }
            for embed in embeds.added {
                changes.added(
                    ChangeType::EmbeddedInterface,
                    &format!("{}.{embed}", after.name),
                    format!("{embed} is now embedded in interface {}", after.name),
                    embed.clone(),
                );
            }
            self.methods("interface", &before.name, &before.methods, &after.methods, changes);
        }
    }

    fn types(&self, old: &Contract, new: &Contract, changes: &mut Changes) {
        let split = partition(&old.types, &new.types);
        for ty in split.removed {
            changes.breaking(
                ChangeType::RemovedType,
                &ty.name,
                format!("type {} was removed", ty.name),
                Some(ty.signature()),
                None,
            );
        }
        for ty in split.added {
            changes.added(
                ChangeType::Type,
                &ty.name,
                format!("type {} was added", ty.name),
                ty.signature(),
            );
        }
        for (before, after) in split.common {
            if before.kind != after.kind {
                changes.breaking(
                    ChangeType::ChangedTypeKind,
                    &before.name,
                    format!("type {} changed from {} to {}", before.name, before.kind, after.kind),
                    Some(before.signature()),
                    Some(after.signature()),
                );
                continue;
            }

            if before.type_params != after.type_params {
                changes.breaking(
                    ChangeType::ChangedTypeParameters,
                    &before.name,
                    format!("type parameters of {} changed", before.name),
                    Some(render_type_params(&before.type_params)),
                    Some(render_type_params(&after.type_params)),
                );
            }

            match before.kind {
                TypeKind::Struct => fields(&before.name, &before.fields, &after.fields, changes),
                TypeKind::Alias if before.underlying != after.underlying => {
                    changes.breaking(
                        ChangeType::ChangedTypeUnderlying,
                        &before.name,
                        format!(
                            "type {} now refers to {} instead of {}",
                            before.name, after.underlying, before.underlying
                        ),
                        Some(before.signature()),
                        Some(after.signature()),
                    );
                }
                TypeKind::Alias | TypeKind::Basic => {}
            }

            self.methods("type", &before.name, &before.methods, &after.methods, changes);
        }
    }

    fn methods(
        &self,
        owner_kind: &str,
        owner: &str,
        old: &[MethodContract],
        new: &[MethodContract],
        changes: &mut Changes,
    ) {
        let split = partition(old, new);
        for method in split.removed {
            changes.breaking(
                ChangeType::RemovedMethod,
                &format!("{owner}.{}", method.name),
                format!("method {} was removed from {owner_kind} {owner}", method.name),
                Some(method.signature()),
                None,
            );
        }
        for method in split.added {
            changes.added(
                ChangeType::Method,
                &format!("{owner}.{}", method.name),
                format!("method {} was added to {owner_kind} {owner}", method.name),
                method.signature(),
            );
        }
        for (before, after) in split.common {
            let (old_sig, new_sig) = (before.signature(), after.signature());
            let item = format!("{owner}.{}", before.name);
            if old_sig != new_sig {
                changes.breaking(
                    ChangeType::ChangedMethodSignature,
                    &item,
                    format!("signature of method {item} changed"),
                    Some(old_sig),
                    Some(new_sig),
                );
            } else if !self.options.ignore_comments && before.doc_comment != after.doc_comment {
                changes.modified(
                    ChangeType::MethodComment,
                    &item,
                    format!("doc comment of method {item} changed"),
                    before.doc_comment.clone(),
                    after.doc_comment.clone(),
                );
            }
        }
    }
}

fn fields(owner: &str, old: &[FieldContract], new: &[FieldContract], changes: &mut Changes) {
    let split = partition(old, new);
    for field in split.removed {
        changes.breaking(
            ChangeType::RemovedField,
            &format!("{owner}.{}", field.name),
            format!("field {} was removed from {owner}", field.name),
            Some(field.signature()),
            None,
        );
    }
    for field in split.added {
        changes.added(
            ChangeType::Field,
            &format!("{owner}.{}", field.name),
            format!("field {} was added to {owner}", field.name),
            field.signature(),
        );
    }
    for (before, after) in split.common {
        let item = format!("{owner}.{}", before.name);
        if before.ty != after.ty || before.embedded != after.embedded {
            changes.breaking(
                ChangeType::ChangedFieldType,
                &item,
                format!("type of field {item} changed from {} to {}", before.ty, after.ty),
                Some(before.signature()),
                Some(after.signature()),
            );
        } else if before.tag != after.tag {
            changes.modified(
                ChangeType::FieldTag,
                &item,
                format!("tag of field {item} changed"),
                before.tag.clone(),
                after.tag.clone(),
            );
        }
    }
}

fn functions(old: &Contract, new: &Contract, changes: &mut Changes) {
    let split = partition(&old.functions, &new.functions);
    for func in split.removed {
        changes.breaking(
            ChangeType::RemovedFunction,
            &func.name,
            format!("function {} was removed", func.name),
            Some(func.signature()),
            None,
        );
    }
    for func in split.added {
        changes.added(
            ChangeType::Function,
            &func.name,
            format!("function {} was added", func.name),
            func.signature(),
        );
    }
    for (before, after) in split.common {
        let (old_sig, new_sig) = (before.signature(), after.signature());
        if old_sig != new_sig {
            changes.breaking(
                ChangeType::ChangedFunctionSignature,
                &before.name,
                format!("signature of function {} changed", before.name),
                Some(old_sig),
                Some(new_sig),
            );
        }
    }
}

fn variables(old: &Contract, new: &Contract, changes: &mut Changes) {
    let split = partition(&old.variables, &new.variables);
    for var in split.removed {
        changes.breaking(
            ChangeType::RemovedVariable,
            &var.name,
            format!("variable {} was removed", var.name),
            Some(var.signature()),
            None,
        );
    }
    for var in split.added {
        changes.added(
            ChangeType::Variable,
            &var.name,
            format!("variable {} was added", var.name),
            var.signature(),
        );
    }
    for (before, after) in split.common {
        if before.ty != after.ty {
            changes.breaking(
                ChangeType::ChangedVariableType,
                &before.name,
                format!("type of variable {} changed from {} to {}", before.name, before.ty, after.ty),
                Some(before.signature()),
                Some(after.signature()),
            );
        }
    }
}

fn constants(old: &Contract, new: &Contract, changes: &mut Changes) {
    let split = partition(&old.constants, &new.constants);
    for constant in split.removed {
        changes.breaking(
            ChangeType::RemovedConstant,
            &constant.name,
            format!("constant {} was removed", constant.name),
            Some(constant.signature()),
            None,
        );
    }
    for constant in split.added {
        changes.added(
            ChangeType::Constant,
            &constant.name,
            format!("constant {} was added", constant.name),
            constant.signature(),
        );
    }
    for (before, after) in split.common {
        if before.ty != after.ty {
            changes.breaking(
                ChangeType::ChangedConstantType,
                &before.name,
                format!("type of constant {} changed from {} to {}", before.name, before.ty, after.ty),
                Some(before.signature()),
                Some(after.signature()),
            );
        } else if before.value != after.value {
            changes.modified(
                ChangeType::ConstantValue,
                &before.name,
                format!("value of constant {} changed", before.name),
                before.value.clone(),
                after.value.clone(),
            );
        }
    }
}

/// The three lists being filled.
#[derive(Default)]
struct Changes {
    breaking: Vec<Change>,
    added: Vec<Change>,
    modified: Vec<Change>,
}

impl Changes {
    fn breaking(
        &mut self,
        change_type: ChangeType,
        item: &str,
        description: String,
        old_value: Option<String>,
        new_value: Option<String>,
    ) {
        self.breaking.push(Change {
            change_type,
            item: item.to_string(),
            description,
            old_value,
            new_value,
        });
    }

    fn added(&mut self, change_type: ChangeType, item: &str, description: String, new_value: String) {
        self.added.push(Change {
            change_type,
            item: item.to_string(),
            description,
            old_value: None,
            new_value: Some(new_value),
        });
    }

    fn modified(
        &mut self,
        change_type: ChangeType,
        item: &str,
        description: String,
        old_value: String,
        new_value: String,
    ) {
        self.modified.push(Change {
            change_type,
            item: item.to_string(),
            description,
            old_value: Some(old_value),
            new_value: Some(new_value),
        });
    }
}
