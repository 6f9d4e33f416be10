//! Linear expressions and constraints over a generic variable name.
//!
//! A [`LinExpr`] is a sparse linear combination of named variables plus a
//! constant term. A [`Constraint`] pins the sign of such an expression
//! (`<= 0` or `= 0`) once it has been normalized by moving the right-hand
//! side to the left, mirroring the teacher's `Expr`/`Sign` split.

use std::collections::{BTreeMap, BTreeSet};

#[cfg(test)]
mod tests;

pub trait VariableName:
    std::fmt::Debug
    + std::fmt::Display
    + PartialOrd
    + Ord
    + PartialEq
    + Eq
    + Clone
    + Send
    + Sync
{
}

impl<T> VariableName for T where
    T: std::fmt::Debug
        + std::fmt::Display
        + PartialOrd
        + Ord
        + PartialEq
        + Eq
        + Clone
        + Send
        + Sync
{
}

#[derive(Debug, Clone, Default, PartialOrd, Ord, PartialEq, Eq)]
pub struct LinExpr<V: VariableName> {
    coefs: BTreeMap<V, ordered_float::OrderedFloat<f64>>,
    constant: ordered_float::OrderedFloat<f64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default)]
pub enum EqSymbol {
    Equals,
    #[default]
    LessThan,
}

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Default)]
pub struct Constraint<V: VariableName> {
    symbol: EqSymbol,
    expr: LinExpr<V>,
}

impl<V: VariableName> LinExpr<V> {
    pub fn var<T: Into<V>>(name: T) -> Self {
        LinExpr {
            coefs: BTreeMap::from([(name.into(), ordered_float::OrderedFloat(1.0))]),
            constant: ordered_float::OrderedFloat(0.0),
        }
    }

    pub fn constant(number: f64) -> Self {
        LinExpr {
            coefs: BTreeMap::new(),
            constant: ordered_float::OrderedFloat(number),
        }
    }

    pub fn weighted_sum<T: Into<V>, I: IntoIterator<Item = (T, f64)>>(terms: I) -> Self {
        let mut coefs: BTreeMap<V, ordered_float::OrderedFloat<f64>> = BTreeMap::new();
        for (name, weight) in terms {
            *coefs
                .entry(name.into())
                .or_insert(ordered_float::OrderedFloat(0.0)) += weight;
        }
        LinExpr {
            coefs,
            constant: ordered_float::OrderedFloat(0.0),
        }
    }

    pub fn get_constant(&self) -> f64 {
        self.constant.into_inner()
    }

    pub fn get<T: Into<V>>(&self, var: T) -> Option<f64> {
        self.coefs.get(&var.into()).map(|x| x.into_inner())
    }

    pub fn variables(&self) -> BTreeSet<V> {
        self.coefs.keys().cloned().collect()
    }

    pub fn coefficients(&self) -> impl Iterator<Item = (&V, f64)> {
        self.coefs.iter().map(|(v, c)| (v, c.into_inner()))
    }

    pub fn leq(&self, rhs: &LinExpr<V>) -> Constraint<V> {
        Constraint {
            expr: self - rhs,
            symbol: EqSymbol::LessThan,
        }
    }

    pub fn geq(&self, rhs: &LinExpr<V>) -> Constraint<V> {
        Constraint {
            expr: rhs - self,
            symbol: EqSymbol::LessThan,
        }
    }

    pub fn eq(&self, rhs: &LinExpr<V>) -> Constraint<V> {
        Constraint {
            expr: self - rhs,
            symbol: EqSymbol::Equals,
        }
    }
}

impl<V: VariableName> Constraint<V> {
    pub fn variables(&self) -> BTreeSet<V> {
        self.expr.variables()
    }

    pub fn coefficients(&self) -> impl Iterator<Item = (&V, f64)> {
        self.expr.coefficients()
    }

    pub fn get_symbol(&self) -> EqSymbol {
        self.symbol
    }

    pub fn get_constant(&self) -> f64 {
        self.expr.get_constant()
    }

    pub fn get_lhs(&self) -> &LinExpr<V> {
        &self.expr
    }
}

impl<V: VariableName> std::fmt::Display for LinExpr<V> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.coefs.is_empty() && self.constant.into_inner() == 0.0 {
            return write!(f, "0");
        }

        let mut it = self.coefs.iter().peekable();
        while let Some((key, value)) = it.next() {
            write!(f, "{}*{}", value, key)?;
            if it.peek().is_some() || self.constant.0 != 0.0 {
                write!(f, " + ")?;
            }
        }

        if self.constant.into_inner() != 0.0 || self.coefs.is_empty() {
            write!(f, "{}", self.constant)?;
        }
        Ok(())
    }
}

impl std::fmt::Display for EqSymbol {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}",
            match self {
                EqSymbol::Equals => "=",
                EqSymbol::LessThan => "<=",
            }
        )
    }
}

impl<V: VariableName> std::fmt::Display for Constraint<V> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} {} 0", self.expr, self.symbol)
    }
}

macro_rules! impl_add_sub {
    ($trait:ident, $method:ident, $op:tt) => {
        impl<V: VariableName> std::ops::$trait for &LinExpr<V> {
            type Output = LinExpr<V>;

            fn $method(self, rhs: &LinExpr<V>) -> Self::Output {
                let mut output = self.clone();
                for (key, value) in rhs.coefs.iter() {
                    let entry = output
                        .coefs
                        .entry(key.clone())
                        .or_insert(ordered_float::OrderedFloat(0.0));
                    *entry = ordered_float::OrderedFloat(entry.into_inner() $op value.into_inner());
                }
                output.constant = ordered_float::OrderedFloat(
                    output.constant.into_inner() $op rhs.constant.into_inner(),
                );
                output.coefs.retain(|_, v| v.into_inner() != 0.0);
                output
            }
        }

        impl<V: VariableName> std::ops::$trait for LinExpr<V> {
            type Output = LinExpr<V>;

            fn $method(self, rhs: LinExpr<V>) -> Self::Output {
                std::ops::$trait::$method(&self, &rhs)
            }
        }
    };
}

impl_add_sub!(Add, add, +);
impl_add_sub!(Sub, sub, -);

impl<V: VariableName> std::ops::Mul<f64> for LinExpr<V> {
    type Output = LinExpr<V>;

    fn mul(self, rhs: f64) -> Self::Output {
        LinExpr {
            coefs: self
                .coefs
                .into_iter()
                .map(|(k, v)| (k, ordered_float::OrderedFloat(v.into_inner() * rhs)))
                .collect(),
            constant: ordered_float::OrderedFloat(self.constant.into_inner() * rhs),
        }
    }
}

impl<V: VariableName> std::ops::Mul<LinExpr<V>> for f64 {
    type Output = LinExpr<V>;

    fn mul(self, rhs: LinExpr<V>) -> Self::Output {
        rhs * self
    }
}
