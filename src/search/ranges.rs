//! Resolution of sentinel-aware identifier filters into closed ranges.

use crate::database::Error;
use crate::search::params::SearchParameters;

/// Largest integer exactly representable by a double-precision float
/// (2^53 − 1). Identifiers travel as floating point to survive JSON
/// round-tripping from untyped transports, so no identifier range may exceed
/// this bound. Do not widen to 64-bit integers: that would change the
/// externally observable range semantics for identifiers above the ceiling.
pub const MAX_SAFE_ID: f64 = 9_007_199_254_740_991.0;

/// A closed identifier range usable in predicates.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct IdRange {
    pub min: f64,
    pub max: f64,
}

impl Default for IdRange {
    fn default() -> Self {
        Self { min: 0.0, max: MAX_SAFE_ID }
    }
}

impl IdRange {
    fn resolve(filter: Option<&str>, field: &'static str) -> Result<Self, Error> {
        match filter {
            None => Ok(Self::default()),
            Some(value) => {
                let id: f64 = value.parse().map_err(|_| Error::InvalidFilter {
                    field,
                    value: value.to_string(),
                })?;
                Ok(Self { min: id, max: id })
            },
        }
    }
}

/// The four resolved ranges for one search call. Derived once per call and
/// discarded after the query is built.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct IdRanges {
    pub action: IdRange,
    pub command: IdRange,
    pub agent: IdRange,
    pub investigator: IdRange,
}

impl IdRanges {
    /// Resolves every identifier filter, aborting on the first non-numeric
    /// one before any query is issued.
    pub fn from_params(p: &SearchParameters) -> Result<Self, Error> {
        Ok(Self {
            action: IdRange::resolve(p.action_id_filter(), "actionid")?,
            command: IdRange::resolve(p.command_id_filter(), "commandid")?,
            agent: IdRange::resolve(p.agent_id_filter(), "agentid")?,
            investigator: IdRange::resolve(p.investigator_id_filter(), "investigatorid")?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sentinel_resolves_to_full_range() {
        let p = SearchParameters::default();
        let ids = IdRanges::from_params(&p).unwrap();
        assert_eq!(ids.action, IdRange { min: 0.0, max: MAX_SAFE_ID });
        assert_eq!(ids.command, IdRange { min: 0.0, max: MAX_SAFE_ID });
        assert_eq!(ids.agent, IdRange { min: 0.0, max: MAX_SAFE_ID });
        assert_eq!(ids.investigator, IdRange { min: 0.0, max: MAX_SAFE_ID });
    }

    #[test]
    fn concrete_value_collapses_to_point_range() {
        let mut p = SearchParameters::default();
        p.action_id = "42".to_string();
        let ids = IdRanges::from_params(&p).unwrap();
        assert_eq!(ids.action, IdRange { min: 42.0, max: 42.0 });
        // Other ranges stay unconstrained.
        assert_eq!(ids.command, IdRange::default());
    }

    #[test]
    fn large_identifier_within_the_ceiling_parses() {
        let mut p = SearchParameters::default();
        p.command_id = "9007199254740991".to_string();
        let ids = IdRanges::from_params(&p).unwrap();
        assert_eq!(ids.command.min, MAX_SAFE_ID);
        assert_eq!(ids.command.max, MAX_SAFE_ID);
    }

    #[test]
    fn non_numeric_filter_is_a_parse_error() {
        let mut p = SearchParameters::default();
        p.investigator_id = "bob".to_string();
        let err = IdRanges::from_params(&p).unwrap_err();
        match err {
            Error::InvalidFilter { field, value } => {
                assert_eq!(field, "investigatorid");
                assert_eq!(value, "bob");
            },
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn ceiling_is_two_to_the_53_minus_one() {
        assert_eq!(MAX_SAFE_ID, (1u64 << 53) as f64 - 1.0);
    }
}
