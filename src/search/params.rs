//! Search filter contract and its wire representations.

use chrono::{DateTime, Duration, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Sentinel meaning "no constraint" for identifier filters.
///
/// Sentinels are a wire-contract artifact: callers arrive through untyped
/// JSON/query-string transports where absent and unconstrained look the same.
/// Inside this crate, the `*_filter` accessors convert them to `Option` so
/// predicate code never compares a sentinel literally.
pub const ID_UNBOUNDED: &str = "∞";

/// Sentinel meaning "no constraint" for pattern filters.
pub const MATCH_ALL: &str = "%";

/// Default search window half-width: 10 years either side of now.
pub const DEFAULT_SEARCH_PERIOD_HOURS: i64 = 39600;

/// Width of the tolerance band around the default window boundary inside
/// which a caller-supplied bound is treated as "still the default" and not
/// rendered as a predicate.
const BOUNDARY_TOLERANCE_HOURS: i64 = 1;

pub(crate) fn search_period() -> Duration {
    Duration::hours(DEFAULT_SEARCH_PERIOD_HOURS)
}

/// Filter criteria for a search over actions, commands, agents, or
/// investigators. Constructed once per request and read-only thereafter.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchParameters {
    #[serde(rename = "actionid")]
    pub action_id: String,
    #[serde(rename = "actionname")]
    pub action_name: String,
    pub after: DateTime<Utc>,
    #[serde(rename = "agentid")]
    pub agent_id: String,
    #[serde(rename = "agentname")]
    pub agent_name: String,
    pub before: DateTime<Utc>,
    #[serde(rename = "commandid")]
    pub command_id: String,
    #[serde(rename = "foundanything")]
    pub found_anything: bool,
    #[serde(rename = "investigatorid")]
    pub investigator_id: String,
    #[serde(rename = "investigatorname")]
    pub investigator_name: String,
    pub limit: f64,
    pub offset: f64,
    pub status: String,
    #[serde(rename = "threatfamily")]
    pub threat_family: String,
    /// Which entity search the caller intends. Informational only.
    #[serde(rename = "type")]
    pub kind: String,
}

impl Default for SearchParameters {
    fn default() -> Self {
        let now = Utc::now();
        Self {
            action_id: ID_UNBOUNDED.to_string(),
            action_name: MATCH_ALL.to_string(),
            after: now - search_period(),
            agent_id: ID_UNBOUNDED.to_string(),
            agent_name: MATCH_ALL.to_string(),
            before: now + search_period(),
            command_id: ID_UNBOUNDED.to_string(),
            found_anything: false,
            investigator_id: ID_UNBOUNDED.to_string(),
            investigator_name: MATCH_ALL.to_string(),
            limit: 100.0,
            offset: 0.0,
            status: MATCH_ALL.to_string(),
            threat_family: MATCH_ALL.to_string(),
            kind: "action".to_string(),
        }
    }
}

fn id_filter(value: &str) -> Option<&str> {
    (value != ID_UNBOUNDED).then_some(value)
}

fn pattern_filter(value: &str) -> Option<&str> {
    (value != MATCH_ALL).then_some(value)
}

impl SearchParameters {
    pub fn action_id_filter(&self) -> Option<&str> {
        id_filter(&self.action_id)
    }

    pub fn command_id_filter(&self) -> Option<&str> {
        id_filter(&self.command_id)
    }

    pub fn agent_id_filter(&self) -> Option<&str> {
        id_filter(&self.agent_id)
    }

    pub fn investigator_id_filter(&self) -> Option<&str> {
        id_filter(&self.investigator_id)
    }

    pub fn action_name_filter(&self) -> Option<&str> {
        pattern_filter(&self.action_name)
    }

    pub fn agent_name_filter(&self) -> Option<&str> {
        pattern_filter(&self.agent_name)
    }

    pub fn investigator_name_filter(&self) -> Option<&str> {
        pattern_filter(&self.investigator_name)
    }

    pub fn status_filter(&self) -> Option<&str> {
        pattern_filter(&self.status)
    }

    pub fn threat_family_filter(&self) -> Option<&str> {
        pattern_filter(&self.threat_family)
    }

    /// Upper time bound, if it is meaningfully inside the default window.
    ///
    /// A bound within one hour of the default +10y boundary is treated as
    /// unset so the default window is never rendered as an always-true
    /// predicate.
    pub fn before_bound(&self) -> Option<DateTime<Utc>> {
        let boundary = Utc::now() + (search_period() - Duration::hours(BOUNDARY_TOLERANCE_HOURS));
        (self.before < boundary).then_some(self.before)
    }

    /// Lower time bound, if it is meaningfully inside the default window.
    pub fn after_bound(&self) -> Option<DateTime<Utc>> {
        let boundary = Utc::now() - (search_period() - Duration::hours(BOUNDARY_TOLERANCE_HOURS));
        (self.after > boundary).then_some(self.after)
    }
}

/// Serializes the effective filter set as a shareable query string.
///
/// `type`, `after`, and `before` are always emitted; every other field only
/// when it differs from its default, in a fixed order, so two equivalent
/// searches render the same URL.
impl fmt::Display for SearchParameters {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "type={}&after={}&before={}",
            self.kind,
            self.after.to_rfc3339_opts(SecondsFormat::Secs, true),
            self.before.to_rfc3339_opts(SecondsFormat::Secs, true)
        )?;
        if let Some(name) = self.agent_name_filter() {
            write!(f, "&agentname={}", name)?;
        }
        if let Some(id) = self.agent_id_filter() {
            write!(f, "&agentid={}", id)?;
        }
        if let Some(name) = self.action_name_filter() {
            write!(f, "&actionname={}", name)?;
        }
        if let Some(id) = self.action_id_filter() {
            write!(f, "&actionid={}", id)?;
        }
        if let Some(id) = self.command_id_filter() {
            write!(f, "&commandid={}", id)?;
        }
        if let Some(id) = self.investigator_id_filter() {
            write!(f, "&investigatorid={}", id)?;
        }
        if let Some(name) = self.investigator_name_filter() {
            write!(f, "&investigatorname={}", name)?;
        }
        if let Some(family) = self.threat_family_filter() {
            write!(f, "&threatfamily={}", family)?;
        }
        if let Some(status) = self.status_filter() {
            write!(f, "&status={}", status)?;
        }
        write!(f, "&limit={:.0}", self.limit)?;
        if self.offset != 0.0 {
            write!(f, "&offset={:.0}", self.offset)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_string_emits_only_type_window_and_limit() {
        let p = SearchParameters::default();
        let rendered = p.to_string();
        let expected = format!(
            "type=action&after={}&before={}&limit=100",
            p.after.to_rfc3339_opts(SecondsFormat::Secs, true),
            p.before.to_rfc3339_opts(SecondsFormat::Secs, true)
        );
        assert_eq!(rendered, expected);
        for absent in
            ["agentname", "agentid", "actionname", "actionid", "commandid", "investigator", "threatfamily", "status", "offset"]
        {
            assert!(!rendered.contains(absent), "unexpected key {absent} in {rendered}");
        }
    }

    #[test]
    fn non_default_fields_are_emitted_in_fixed_order() {
        let mut p = SearchParameters::default();
        p.agent_name = "web%".to_string();
        p.action_id = "12".to_string();
        p.status = "done".to_string();
        p.offset = 200.0;
        let rendered = p.to_string();
        let agentname = rendered.find("agentname=web%").unwrap();
        let actionid = rendered.find("actionid=12").unwrap();
        let status = rendered.find("status=done").unwrap();
        let limit = rendered.find("limit=100").unwrap();
        let offset = rendered.find("offset=200").unwrap();
        assert!(agentname < actionid && actionid < status && status < limit && limit < offset);
    }

    #[test]
    fn limit_renders_without_fraction() {
        let mut p = SearchParameters::default();
        p.limit = 50.0;
        assert!(p.to_string().ends_with("&limit=50"));
    }

    #[test]
    fn sentinel_accessors_report_unset() {
        let p = SearchParameters::default();
        assert!(p.action_id_filter().is_none());
        assert!(p.agent_name_filter().is_none());
        assert!(p.status_filter().is_none());
        assert!(p.threat_family_filter().is_none());
    }

    #[test]
    fn literal_values_pass_through_accessors() {
        let mut p = SearchParameters::default();
        p.investigator_id = "9".to_string();
        p.investigator_name = "sam".to_string();
        assert_eq!(p.investigator_id_filter(), Some("9"));
        assert_eq!(p.investigator_name_filter(), Some("sam"));
    }

    #[test]
    fn default_bounds_are_suppressed() {
        let p = SearchParameters::default();
        assert!(p.before_bound().is_none());
        assert!(p.after_bound().is_none());
    }

    #[test]
    fn bounds_within_boundary_tolerance_are_suppressed() {
        let mut p = SearchParameters::default();
        p.before = Utc::now() + search_period() - Duration::minutes(30);
        p.after = Utc::now() - search_period() + Duration::minutes(30);
        assert!(p.before_bound().is_none());
        assert!(p.after_bound().is_none());
    }

    #[test]
    fn narrow_bounds_are_applied() {
        let mut p = SearchParameters::default();
        p.before = Utc::now() + Duration::days(1);
        p.after = Utc::now() - Duration::days(1);
        assert_eq!(p.before_bound(), Some(p.before));
        assert_eq!(p.after_bound(), Some(p.after));
    }

    #[test]
    fn serde_round_trip_uses_wire_names() {
        let p = SearchParameters::default();
        let value = serde_json::to_value(&p).unwrap();
        assert!(value.get("actionid").is_some());
        assert!(value.get("foundanything").is_some());
        assert!(value.get("type").is_some());
        let back: SearchParameters = serde_json::from_value(value).unwrap();
        assert_eq!(back.action_id, ID_UNBOUNDED);
        assert_eq!(back.kind, "action");
    }
}
