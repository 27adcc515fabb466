//! Structural fingerprints of problems.
//!
//! A fingerprint is a SHA-256 Merkle digest over the expression graph: each node hashes its
//! tag, shape, analyzer facts, leaf attributes and the digests of its children. Parameter values
//! never enter the digest, so rebinding parameters keeps the fingerprint. Shared subtrees are
//! hashed once per fingerprint.

use std::collections::HashMap;
use std::fmt;

use sha2::{Digest, Sha256};

use crate::canon::canonicalizer::atom_name;
use crate::constraints::Constraint;
use crate::dcp::{Analyzer, Facts};
use crate::expr::{Expr, Shape};
use crate::problem::Objective;

/// SHA-256 digest identifying the structure of a problem.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct Fingerprint([u8; 32]);

impl Fingerprint {
    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    pub fn to_hex(&self) -> String {
        self.0.iter().map(|b| format!("{:02x}", b)).collect()
    }

    /// Leading eight hex digits, for log lines.
    pub fn short(&self) -> String {
        self.to_hex()[..8].to_string()
    }
}

impl fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

impl fmt::Debug for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Fingerprint({})", self.short())
    }
}

/// Fingerprint of an objective and its constraints, in order.
pub fn fingerprint(objective: &Objective, constraints: &[Constraint]) -> Fingerprint {
    let mut hasher = NodeHasher::new();
    let mut digest = Sha256::new();

    let sense: &[u8] = if objective.is_minimize() { b"minimize" } else { b"maximize" };
    digest.update(sense);
    digest.update(hasher.node(objective.expr()));

    digest.update((constraints.len() as u64).to_le_bytes());
    for constraint in constraints {
        digest.update(hasher.constraint(constraint));
    }
    Fingerprint(digest.finalize().into())
}

/// Per-node digests, memoized by node address.
struct NodeHasher<'a> {
    analyzer: Analyzer<'a>,
    memo: HashMap<*const Expr, [u8; 32]>,
}

impl<'a> NodeHasher<'a> {
    fn new() -> Self {
        NodeHasher {
            analyzer: Analyzer::new(),
            memo: HashMap::new(),
        }
    }

    fn constraint(&mut self, constraint: &'a Constraint) -> [u8; 32] {
        let tag: &[u8] = match constraint {
            Constraint::Equal { .. } => b"eq",
            Constraint::LessEq { .. } => b"leq",
            Constraint::SecondOrder { .. } => b"soc",
        };
        let mut digest = Sha256::new();
        digest.update(tag);
        for expr in constraint.expressions() {
            digest.update(self.node(expr));
        }
        digest.finalize().into()
    }

    fn node(&mut self, expr: &'a Expr) -> [u8; 32] {
        let key = expr as *const Expr;
        if let Some(done) = self.memo.get(&key) {
            return *done;
        }

        let mut digest = Sha256::new();
        digest.update(atom_name(expr).as_bytes());
        update_shape(&mut digest, &expr.shape());
        update_facts(&mut digest, self.analyzer.facts(expr));

        match expr {
            Expr::Variable(v) => {
                digest.update(v.id.raw().to_le_bytes());
                digest.update([v.nonneg as u8, v.nonpos as u8]);
            }
            Expr::Parameter(p) => {
                digest.update(p.id.raw().to_le_bytes());
                digest.update([p.nonneg as u8, p.nonpos as u8]);
            }
            Expr::Constant(c) => {
                for v in c.value.as_slice() {
                    digest.update(v.to_le_bytes());
                }
            }
            Expr::Index(_, spec) => {
                let positions = spec.positions();
                digest.update((positions.start as u64).to_le_bytes());
                digest.update((positions.end as u64).to_le_bytes());
            }
            Expr::Power(_, p) => digest.update(p.to_le_bytes()),
            Expr::Inverse(f, _) => digest.update(f.to_string().as_bytes()),
            _ => {}
        }

        let children = expr.children();
        digest.update((children.len() as u64).to_le_bytes());
        for child in children {
            let child_digest = self.node(child);
            digest.update(child_digest);
        }

        let out: [u8; 32] = digest.finalize().into();
        self.memo.insert(key, out);
        out
    }
}

fn update_shape(digest: &mut Sha256, shape: &Shape) {
    digest.update((shape.ndim() as u64).to_le_bytes());
    for d in shape.dims() {
        digest.update((*d as u64).to_le_bytes());
    }
}

fn update_facts(digest: &mut Sha256, facts: Facts) {
    digest.update([
        facts.curvature as u8,
        facts.quasiconvex as u8,
        facts.quasiconcave as u8,
        facts.sign as u8,
    ]);
}
