use std::collections::BTreeSet;
use std::fmt;

use serde::{Deserialize, Serialize};

/// Every table in a customer's record graph.
///
/// Declaration order doubles as the tie-break for topological sorts, so the
/// derived deletion order for the full graph reads top to bottom.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityKind {
    Bill,
    Document,
    CommunicationProperty,
    Communication,
    Protest,
    Application,
    Property,
    Contact,
    Owner,
    CreditTransaction,
    VerificationCode,
    ReferralRelationship,
    Profile,
}

/// A child column that must point at an existing parent row.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ForeignKey {
    pub column: &'static str,
    pub parent: EntityKind,
}

// Expands to a plain struct literal so the slices below stay promotable to
// `'static` inside a const fn.
macro_rules! fk {
    ($column:literal, $parent:ident) => {
        ForeignKey {
            column: $column,
            parent: EntityKind::$parent,
        }
    };
}

impl EntityKind {
    pub const ALL: [Self; 13] = [
        Self::Bill,
        Self::Document,
        Self::CommunicationProperty,
        Self::Communication,
        Self::Protest,
        Self::Application,
        Self::Property,
        Self::Contact,
        Self::Owner,
        Self::CreditTransaction,
        Self::VerificationCode,
        Self::ReferralRelationship,
        Self::Profile,
    ];

    pub const fn table_name(self) -> &'static str {
        match self {
            Self::Bill => "bills",
            Self::Document => "customer_documents",
            Self::CommunicationProperty => "communication_properties",
            Self::Communication => "communications",
            Self::Protest => "protests",
            Self::Application => "applications",
            Self::Property => "properties",
            Self::Contact => "contacts",
            Self::Owner => "owners",
            Self::CreditTransaction => "credit_transactions",
            Self::VerificationCode => "verification_codes",
            Self::ReferralRelationship => "referral_relationships",
            Self::Profile => "profiles",
        }
    }

    pub const fn references(self) -> &'static [ForeignKey] {
        use EntityKind::*;
        match self {
            Bill => &[
                fk!("user_id", Profile),
                fk!("owner_id", Owner),
                fk!("protest_id", Protest),
            ],
            Document => &[fk!("user_id", Profile), fk!("property_id", Property)],
            CommunicationProperty => &[
                fk!("communication_id", Communication),
                fk!("property_id", Property),
            ],
            Communication => &[fk!("contact_id", Contact)],
            Protest => &[fk!("property_id", Property)],
            Application => &[fk!("property_id", Property), fk!("user_id", Profile)],
            Property => &[
                fk!("user_id", Profile),
                fk!("owner_id", Owner),
                fk!("contact_id", Contact),
            ],
            Contact => &[],
            Owner => &[fk!("created_by", Profile)],
            CreditTransaction => &[fk!("user_id", Profile)],
            VerificationCode => &[fk!("user_id", Profile)],
            ReferralRelationship => &[fk!("referrer_id", Profile), fk!("referee_id", Profile)],
            Profile => &[],
        }
    }

    /// Columns that must hold distinct values across the table.
    pub const fn unique_columns(self) -> &'static [&'static str] {
        match self {
            Self::Profile => &["email"],
            Self::Property => &["address"],
            _ => &[],
        }
    }

    /// Foreign keys on other tables pointing at this one.
    pub fn referenced_by(self) -> Vec<(EntityKind, ForeignKey)> {
        Self::ALL
            .iter()
            .flat_map(|child| {
                child
                    .references()
                    .iter()
                    .filter(move |key| key.parent == self)
                    .map(move |key| (*child, *key))
            })
            .collect()
    }

    fn position(self) -> usize {
        Self::ALL
            .iter()
            .position(|kind| *kind == self)
            .unwrap_or(usize::MAX)
    }
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.table_name())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SchemaError {
    #[error("dependency cycle among tables: {0:?}")]
    Cycle(Vec<EntityKind>),
    #[error("{child} is created before its parent {parent}")]
    ParentAfterChild {
        child: EntityKind,
        parent: EntityKind,
    },
}

/// The kind plus all of its transitive parents, ordered leaf to root.
pub fn dependency_order(kind: EntityKind) -> Vec<EntityKind> {
    let mut closure = BTreeSet::new();
    collect_parents(kind, &mut closure);
    let kinds: Vec<EntityKind> = closure.into_iter().collect();
    // A closure of a static DAG cannot contain a cycle.
    creation_order(&kinds).unwrap_or(kinds)
}

fn collect_parents(kind: EntityKind, closure: &mut BTreeSet<EntityKind>) {
    if !closure.insert(kind) {
        return;
    }
    for key in kind.references() {
        collect_parents(key.parent, closure);
    }
}

/// Order in which the given tables can be cleared without orphaning a row.
///
/// A table is emitted only once every table in the set that references it has
/// been emitted. References from tables outside the set are ignored.
pub fn deletion_order(kinds: &[EntityKind]) -> Result<Vec<EntityKind>, SchemaError> {
    let mut remaining: Vec<EntityKind> = kinds.to_vec();
    remaining.sort_by_key(|kind| kind.position());
    remaining.dedup();

    let mut ordered = Vec::with_capacity(remaining.len());
    while !remaining.is_empty() {
        let next = remaining.iter().position(|candidate| {
            !remaining.iter().any(|other| {
                other != candidate
                    && other
                        .references()
                        .iter()
                        .any(|key| key.parent == *candidate)
            })
        });

        match next {
            Some(index) => ordered.push(remaining.remove(index)),
            None => return Err(SchemaError::Cycle(remaining)),
        }
    }

    Ok(ordered)
}

/// Reverse of [`deletion_order`]: parents always precede their children.
pub fn creation_order(kinds: &[EntityKind]) -> Result<Vec<EntityKind>, SchemaError> {
    let mut ordered = deletion_order(kinds)?;
    ordered.reverse();
    Ok(ordered)
}

/// Checks a hand-written creation plan against the graph.
///
/// Every parent that also appears in the plan must come before the child.
pub fn respects_dependencies(sequence: &[EntityKind]) -> Result<(), SchemaError> {
    for (index, child) in sequence.iter().enumerate() {
        for key in child.references() {
            if let Some(parent_index) = sequence.iter().position(|kind| *kind == key.parent) {
                if parent_index > index {
                    return Err(SchemaError::ParentAfterChild {
                        child: *child,
                        parent: key.parent,
                    });
                }
            }
        }
    }
    Ok(())
}
