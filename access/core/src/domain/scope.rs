// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! # Scope Predicates
//!
//! Row-level filtering rules expressed as plain data. A [`ScopePredicate`] is a
//! template over two attribute sources: the calling [`super::principal::Principal`]
//! and the entity under test.
//!
//! ## Evaluation
//!
//! ```text
//! ScopePredicate (template)
//!   └─ bind(principal)   ← principal operands resolved to literals
//!         └─ matches(entity)   ← pure, used for collection filters and
//!                                single-entity checks alike
//! ```
//!
//! Binding fails closed: if any principal operand cannot be resolved the whole
//! bound predicate becomes [`ScopePredicate::Never`]. A `Not` over a missing
//! principal attribute therefore never widens access.

use serde::{Deserialize, Serialize};

use super::attribute::{AttributeSource, AttributeValue};

/// Right-hand side of a comparison.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "from", content = "value", rename_all = "snake_case")]
pub enum ScopeOperand {
    /// Fixed value.
    Literal(AttributeValue),
    /// Named attribute of the calling principal.
    Principal(String),
}

impl ScopeOperand {
    fn resolve<P: AttributeSource + ?Sized>(&self, principal: &P) -> Option<AttributeValue> {
        match self {
            ScopeOperand::Literal(value) => Some(value.clone()),
            ScopeOperand::Principal(name) => principal.attribute(name).filter(|v| !v.is_null()),
        }
    }

    fn literal(&self) -> Option<&AttributeValue> {
        match self {
            ScopeOperand::Literal(value) => Some(value),
            ScopeOperand::Principal(_) => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum ScopePredicate {
    Always,
    Never,
    Equals {
        attribute: String,
        operand: ScopeOperand,
    },
    MemberOf {
        attribute: String,
        operands: Vec<ScopeOperand>,
    },
    And {
        all: Vec<ScopePredicate>,
    },
    Or {
        any: Vec<ScopePredicate>,
    },
    Not {
        predicate: Box<ScopePredicate>,
    },
}

impl Default for ScopePredicate {
    fn default() -> Self {
        ScopePredicate::Always
    }
}

impl ScopePredicate {
    /// `entity.attribute == value`
    pub fn equals(attribute: impl Into<String>, value: impl Into<AttributeValue>) -> Self {
        ScopePredicate::Equals {
            attribute: attribute.into(),
            operand: ScopeOperand::Literal(value.into()),
        }
    }

    /// `entity.attribute == principal.principal_attribute`
    pub fn equals_principal(attribute: impl Into<String>, principal_attribute: impl Into<String>) -> Self {
        ScopePredicate::Equals {
            attribute: attribute.into(),
            operand: ScopeOperand::Principal(principal_attribute.into()),
        }
    }

    /// `entity.attribute ∈ values`
    pub fn member_of<V: Into<AttributeValue>>(
        attribute: impl Into<String>,
        values: impl IntoIterator<Item = V>,
    ) -> Self {
        ScopePredicate::MemberOf {
            attribute: attribute.into(),
            operands: values
                .into_iter()
                .map(|v| ScopeOperand::Literal(v.into()))
                .collect(),
        }
    }

    pub fn negate(predicate: ScopePredicate) -> Self {
        ScopePredicate::Not {
            predicate: Box::new(predicate),
        }
    }

    /// Conjunction, flattening nested `And`s. `Always` is the identity and
    /// `Never` absorbs.
    pub fn and(self, other: ScopePredicate) -> Self {
        match (self, other) {
            (ScopePredicate::Always, p) | (p, ScopePredicate::Always) => p,
            (ScopePredicate::Never, _) | (_, ScopePredicate::Never) => ScopePredicate::Never,
            (ScopePredicate::And { mut all }, ScopePredicate::And { all: rest }) => {
                all.extend(rest);
                ScopePredicate::And { all }
            }
            (ScopePredicate::And { mut all }, p) => {
                all.push(p);
                ScopePredicate::And { all }
            }
            (p, ScopePredicate::And { mut all }) => {
                all.insert(0, p);
                ScopePredicate::And { all }
            }
            (a, b) => ScopePredicate::And { all: vec![a, b] },
        }
    }

    /// Disjunction. `Never` is the identity and `Always` absorbs.
    pub fn or(self, other: ScopePredicate) -> Self {
        match (self, other) {
            (ScopePredicate::Never, p) | (p, ScopePredicate::Never) => p,
            (ScopePredicate::Always, _) | (_, ScopePredicate::Always) => ScopePredicate::Always,
            (ScopePredicate::Or { mut any }, p) => {
                any.push(p);
                ScopePredicate::Or { any }
            }
            (a, b) => ScopePredicate::Or { any: vec![a, b] },
        }
    }

    /// Resolve every principal operand against `principal`.
    ///
    /// The result only contains literal operands and can be handed to a
    /// storage collaborator as a filter.
    pub fn bind<P: AttributeSource + ?Sized>(&self, principal: &P) -> ScopePredicate {
        self.try_bind(principal).unwrap_or(ScopePredicate::Never)
    }

    fn try_bind<P: AttributeSource + ?Sized>(&self, principal: &P) -> Option<ScopePredicate> {
        let bound = match self {
            ScopePredicate::Always | ScopePredicate::Never => self.clone(),
            ScopePredicate::Equals { attribute, operand } => ScopePredicate::Equals {
                attribute: attribute.clone(),
                operand: ScopeOperand::Literal(operand.resolve(principal)?),
            },
            ScopePredicate::MemberOf { attribute, operands } => ScopePredicate::MemberOf {
                attribute: attribute.clone(),
                operands: operands
                    .iter()
                    .map(|o| o.resolve(principal).map(ScopeOperand::Literal))
                    .collect::<Option<Vec<_>>>()?,
            },
            ScopePredicate::And { all } => ScopePredicate::And {
                all: all
                    .iter()
                    .map(|p| p.try_bind(principal))
                    .collect::<Option<Vec<_>>>()?,
            },
            ScopePredicate::Or { any } => ScopePredicate::Or {
                any: any
                    .iter()
                    .map(|p| p.try_bind(principal))
                    .collect::<Option<Vec<_>>>()?,
            },
            ScopePredicate::Not { predicate } => ScopePredicate::Not {
                predicate: Box::new(predicate.try_bind(principal)?),
            },
        };
        Some(bound)
    }

    /// Evaluate a bound predicate against an entity. Unbound principal
    /// operands never match.
    pub fn matches<E: AttributeSource + ?Sized>(&self, entity: &E) -> bool {
        match self {
            ScopePredicate::Always => true,
            ScopePredicate::Never => false,
            ScopePredicate::Equals { attribute, operand } => match operand.literal() {
                Some(expected) => entity.attribute(attribute).as_ref() == Some(expected),
                None => false,
            },
            ScopePredicate::MemberOf { attribute, operands } => match entity.attribute(attribute) {
                Some(actual) => operands.iter().any(|o| o.literal() == Some(&actual)),
                None => false,
            },
            ScopePredicate::And { all } => all.iter().all(|p| p.matches(entity)),
            ScopePredicate::Or { any } => any.iter().any(|p| p.matches(entity)),
            ScopePredicate::Not { predicate } => !predicate.matches(entity),
        }
    }

    /// `bind(principal).matches(entity)` in one call.
    pub fn evaluate<P, E>(&self, principal: &P, entity: &E) -> bool
    where
        P: AttributeSource + ?Sized,
        E: AttributeSource + ?Sized,
    {
        self.bind(principal).matches(entity)
    }

    /// `(entity attribute, principal attribute)` pairs that every matching
    /// entity must share with the principal.
    ///
    /// Only equalities that are mandatory (top level or under `And`) are
    /// reported; these are the attributes a create may stamp from the caller.
    pub fn principal_bindings(&self) -> Vec<(&str, &str)> {
        let mut out = Vec::new();
        self.collect_bindings(&mut out);
        out
    }

    fn collect_bindings<'a>(&'a self, out: &mut Vec<(&'a str, &'a str)>) {
        match self {
            ScopePredicate::Equals {
                attribute,
                operand: ScopeOperand::Principal(name),
            } => out.push((attribute.as_str(), name.as_str())),
            ScopePredicate::And { all } => all.iter().for_each(|p| p.collect_bindings(out)),
            _ => {}
        }
    }
}
