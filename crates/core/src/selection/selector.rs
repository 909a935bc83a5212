use rand::Rng;

use crate::domain::participant::Candidate;
use crate::errors::DomainError;
use crate::selection::fairness::WeightTable;

/// Cumulative-weight draw over `eligible`, walked in the given order.
///
/// A single candidate is returned without consulting `weights` or `rng`.
/// An empty pool, or a candidate without a positive weight, is a caller
/// error.
pub fn select<R>(
    eligible: &[Candidate],
    weights: &WeightTable,
    rng: &mut R,
) -> Result<Candidate, DomainError>
where
    R: Rng,
{
    match eligible {
        [] => {
            return Err(DomainError::InvalidArgument(
                "cannot select from an empty eligible pool".to_owned(),
            ))
        }
        [only] => return Ok(only.clone()),
        _ => {}
    }

    let mut entries = Vec::with_capacity(eligible.len());
    for candidate in eligible {
        let weight = weights.get(candidate).ok_or_else(|| {
            DomainError::InvalidArgument(format!("no weight for eligible candidate `{candidate}`"))
        })?;
        if !weight.is_finite() || weight <= 0.0 {
            return Err(DomainError::InvalidArgument(format!(
                "weight for `{candidate}` must be positive, got {weight}"
            )));
        }
        entries.push((candidate, weight));
    }

    let total: f64 = entries.iter().map(|(_, weight)| weight).sum();
    if !total.is_finite() {
        return Err(DomainError::InvalidArgument(format!(
            "total weight of {} candidates is not finite",
            entries.len()
        )));
    }
    let mut remainder = rng.gen_range(0.0..total);
    for (candidate, weight) in &entries {
        remainder -= weight;
        if remainder <= 0.0 {
            return Ok((*candidate).clone());
        }
    }

    // Float rounding can leave a sliver past the last boundary.
    Ok(entries[entries.len() - 1].0.clone())
}
