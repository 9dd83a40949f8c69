//! Polynomials over the BLS12-381 scalar field and their group commitments.
//!
//! A secret is dealt as the constant term of a random polynomial of degree
//! `threshold - 1`; share `i` is the polynomial evaluated at `x = i + 1`
//! (zero is never used as an evaluation point since it holds the secret).
//! Recovery interpolates the value at zero from any `threshold` distinct
//! evaluations.
//!
//! # Warning
//!
//! The correctness of interpolation is consensus-critical: recovery always
//! operates on the ascending-index prefix of the provided evaluations so that
//! the recovered element is independent of arrival order and of any surplus
//! evaluations.

use super::{
    group::{Element, Scalar, G1},
    Error,
};
use rand::RngCore;

/// A polynomial evaluation at a specific index.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct Eval<C> {
    /// The evaluation index (the x-coordinate is `index + 1`).
    pub index: u32,
    /// The evaluated element.
    pub value: C,
}

/// A polynomial with coefficients in `C`, constant term first.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Poly<C>(Vec<C>);

/// A secret-dealing polynomial.
pub type Private = Poly<Scalar>;

/// A commitment to a secret-dealing polynomial.
pub type Public = Poly<G1>;

impl<C: Element> Poly<C> {
    /// The degree of the polynomial.
    pub fn degree(&self) -> u32 {
        (self.0.len() - 1) as u32
    }

    /// The constant term (the committed secret, for a [`Public`] polynomial
    /// this is the group public key).
    pub fn constant(&self) -> &C {
        &self.0[0]
    }

    /// Evaluates the polynomial at `x = index + 1` using Horner's rule.
    pub fn evaluate(&self, index: u32) -> Eval<C> {
        let mut x = Scalar::zero();
        x.set_int(index.checked_add(1).expect("evaluation index overflow"));
        let mut iter = self.0.iter().rev();
        let mut acc = iter
            .next()
            .expect("polynomial has at least one coefficient")
            .clone();
        for coeff in iter {
            acc.mul(&x);
            acc.add(coeff);
        }
        Eval { index, value: acc }
    }
}

impl Private {
    /// Generates a random polynomial of the provided degree.
    pub fn rand<R: RngCore>(rng: &mut R, degree: u32) -> Self {
        Self((0..=degree).map(|_| Scalar::rand(rng)).collect())
    }

    /// Commits the polynomial to G1 (each coefficient times the generator).
    pub fn commit(&self) -> Public {
        Poly(
            self.0
                .iter()
                .map(|coeff| {
                    let mut point = G1::one();
                    point.mul(coeff);
                    point
                })
                .collect(),
        )
    }
}

/// Interpolates the value at zero from at least `threshold` evaluations.
///
/// The ascending-index prefix of length `threshold` is the interpolation set;
/// surplus evaluations are ignored. Fails on duplicate indices within that
/// set (interpolation would divide by zero) and when fewer than `threshold`
/// evaluations are provided.
pub fn recover<C: Element>(threshold: u32, evals: &[Eval<C>]) -> Result<C, Error> {
    let required = threshold as usize;
    if evals.len() < required {
        return Err(Error::NotEnoughShares(evals.len(), required));
    }
    let mut sorted: Vec<&Eval<C>> = evals.iter().collect();
    sorted.sort_by_key(|eval| eval.index);
    let subset = &sorted[..required];
    for pair in subset.windows(2) {
        if pair[0].index == pair[1].index {
            return Err(Error::DuplicateIndex(pair[0].index));
        }
    }

    // x-coordinates of the interpolation set.
    let xs: Vec<Scalar> = subset
        .iter()
        .map(|eval| {
            let mut x = Scalar::zero();
            x.set_int(eval.index + 1);
            x
        })
        .collect();

    // The Lagrange basis at zero for share `i` is
    //   prod(xs) / (xs[i] * prod_{j != i}(xs[j] - xs[i]))
    // where the numerator is shared across shares: dividing the share's own
    // coordinate back out beats recomputing the partial product per share.
    let mut shared = Scalar::one();
    for x in &xs {
        shared.mul(x);
    }

    let mut recovered = C::zero();
    for (i, eval) in subset.iter().enumerate() {
        let mut divisor = xs[i].clone();
        for (j, x) in xs.iter().enumerate() {
            if j == i {
                continue;
            }
            let mut delta = x.clone();
            delta.sub(&xs[i]);
            divisor.mul(&delta);
        }

        let mut basis = shared.clone();
        basis.mul(&divisor.inverse().ok_or(Error::NoInverse)?);

        let mut weighted = eval.value.clone();
        weighted.mul(&basis);
        recovered.add(&weighted);
    }
    Ok(recovered)
}
